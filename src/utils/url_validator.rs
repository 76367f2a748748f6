//! 目标 URL 验证
//!
//! 只允许 http/https 绝对地址，阻止危险协议

use url::Url;

use crate::errors::{LinkHubError, Result};

/// 危险协议列表
const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// 验证目标 URL
///
/// 检查项目：
/// 1. URL 不为空
/// 2. 不是危险协议（javascript:, data:, file: 等）
/// 3. 必须是 http:// 或 https:// 绝对地址
/// 4. URL 格式有效
pub fn validate_target_url(raw: &str) -> Result<()> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(LinkHubError::validation("target URL cannot be empty"));
    }

    let lower = raw.to_lowercase();

    for proto in DANGEROUS_PROTOCOLS {
        if lower.starts_with(proto) {
            return Err(LinkHubError::validation(format!(
                "dangerous protocol blocked: {}",
                proto
            )));
        }
    }

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(LinkHubError::validation(
            "target URL must start with http:// or https://",
        ));
    }

    let parsed = Url::parse(raw)
        .map_err(|e| LinkHubError::validation(format!("invalid URL format: {}", e)))?;

    if parsed.host_str().is_none() {
        return Err(LinkHubError::validation("target URL must have a host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_target_url("http://example.com").is_ok());
        assert!(validate_target_url("https://example.com/a/b?query=1").is_ok());
        assert!(validate_target_url("http://localhost:8080").is_ok());
        assert!(validate_target_url("HTTPS://EXAMPLE.COM").is_ok());
    }

    #[test]
    fn test_dangerous_protocols_blocked() {
        assert!(validate_target_url("javascript:alert(1)").is_err());
        assert!(validate_target_url("JAVASCRIPT:alert(1)").is_err());
        assert!(validate_target_url("data:text/html,<script></script>").is_err());
        assert!(validate_target_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_non_http_rejected() {
        assert!(validate_target_url("ftp://example.com").is_err());
        assert!(validate_target_url("mailto:me@example.com").is_err());
        assert!(validate_target_url("//example.com/path").is_err());
        assert!(validate_target_url("example.com").is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(validate_target_url("").is_err());
        assert!(validate_target_url("   ").is_err());
    }
}
