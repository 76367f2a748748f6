pub mod ip;
pub mod password;
pub mod url_validator;

pub use url_validator::validate_target_url;

/// 短码格式校验：4-10 位，字符集 [A-Za-z0-9_-]
///
/// 重定向热路径在触达缓存/数据库之前先用它挡掉垃圾请求，
/// 点击批量 SQL 也用它做二次防注入校验。
pub fn is_valid_short_code(code: &str) -> bool {
    let len = code.len();
    (4..=10).contains(&len)
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// 生成安全随机 token（用于未配置 JWT secret 时的兜底）
pub fn generate_secure_token(length: usize) -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_short_codes() {
        assert!(is_valid_short_code("abcd"));
        assert!(is_valid_short_code("my-brand"));
        assert!(is_valid_short_code("A1_b2-C3d4"));
        assert!(is_valid_short_code("0000"));
    }

    #[test]
    fn test_invalid_short_codes() {
        assert!(!is_valid_short_code(""));
        assert!(!is_valid_short_code("abc")); // 太短
        assert!(!is_valid_short_code("abcdefghijk")); // 太长
        assert!(!is_valid_short_code("ab cd"));
        assert!(!is_valid_short_code("ab/cd"));
        assert!(!is_valid_short_code("短链接"));
        assert!(!is_valid_short_code("abc%"));
    }

    #[test]
    fn test_generate_secure_token_length_and_charset() {
        let token = generate_secure_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
