//! 短码生成器
//!
//! 随机码从 64 字符字母表抽取 7 位（64^7 ≈ 4.4 万亿组合），
//! 碰撞概率可忽略但不假设为零：创建路径在主键冲突时换码重试，
//! 重试上限耗尽后上浮 GenerationExhausted。

use rand::Rng;

use crate::errors::{LinkHubError, Result};
use crate::utils::is_valid_short_code;

/// 随机短码字母表，与短码格式校验的字符集一致
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// 随机短码长度
pub const RANDOM_CODE_LEN: usize = 7;

/// 随机码碰撞重试上限
pub const MAX_GENERATE_ATTEMPTS: u32 = 5;

/// 生成一个随机短码
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// 校验自定义别名
///
/// 只做格式检查并返回规范化别名；原子占位由存储层的
/// insert-or-fail 语义完成（见 `SeaOrmStorage::create`）。
pub fn validate_custom(alias: &str) -> Result<String> {
    let alias = alias.trim();

    if !is_valid_short_code(alias) {
        return Err(LinkHubError::validation(format!(
            "invalid custom alias '{}': must be 4-10 chars of [A-Za-z0-9_-]",
            alias
        )));
    }

    Ok(alias.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..1000 {
            let code = generate();
            assert_eq!(code.len(), RANDOM_CODE_LEN);
            assert!(is_valid_short_code(&code), "invalid code: {}", code);
        }
    }

    #[test]
    fn test_generated_codes_are_dispersed() {
        // 1000 次抽取在 64^7 空间里撞车的概率约 1e-7，碰撞即视为 bug
        let codes: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_validate_custom_accepts_valid_alias() {
        assert_eq!(validate_custom("my-brand").unwrap(), "my-brand");
        assert_eq!(validate_custom("  padded1  ").unwrap(), "padded1");
        assert_eq!(validate_custom("AB_cd-12").unwrap(), "AB_cd-12");
    }

    #[test]
    fn test_validate_custom_rejects_bad_alias() {
        assert!(validate_custom("abc").is_err());
        assert!(validate_custom("way-too-long-alias").is_err());
        assert!(validate_custom("bad space").is_err());
        assert!(validate_custom("slash/es").is_err());
        assert!(validate_custom("").is_err());
    }
}
