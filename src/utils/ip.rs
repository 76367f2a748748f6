//! 客户端 IP 提取
//!
//! 重定向热路径在同步阶段只拿到字符串，GeoIP 解析在管线消费端进行。

use std::net::IpAddr;

use actix_web::HttpRequest;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA), fe80::/10 (link-local), ::1 (loopback)
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 从请求中提取真实客户端 IP
///
/// 策略：连接来自私有/本地地址（即经过反向代理）时信任
/// X-Forwarded-For 的第一跳，其次 X-Real-IP；公网直连场景
/// 直接使用连接对端地址，防止头部伪造。
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    let peer_ip = req.peer_addr().map(|addr| addr.ip());

    let behind_proxy = peer_ip.map(|ip| is_private_or_local(&ip)).unwrap_or(false);

    if behind_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                let candidate = first.trim();
                if candidate.parse::<IpAddr>().is_ok() {
                    return Some(candidate.to_string());
                }
            }
        }

        if let Some(real_ip) = req
            .headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
        {
            let candidate = real_ip.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return Some(candidate.to_string());
            }
        }
    }

    peer_ip.map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_v4() {
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.5.5".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_private_v6() {
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd12:3456::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"2001:4860:4860::8888".parse().unwrap()));
    }
}
