//! 点击维度分类（纯函数）
//!
//! referrer 和 user_agent 在捕获时原样落盘，这里的分类只在聚合时
//! 执行。改税目（taxonomy）不需要回填历史数据 —— 重新聚合即可。

use once_cell::sync::Lazy;
use woothee::parser::Parser;

static UA_PARSER: Lazy<Parser> = Lazy::new(Parser::new);

/// referrer 归类：direct / 已知平台桶 / other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferrerSource {
    Direct,
    Google,
    Bing,
    Twitter,
    Facebook,
    Instagram,
    LinkedIn,
    Reddit,
    YouTube,
    GitHub,
    Other,
}

impl ReferrerSource {
    pub fn label(&self) -> &'static str {
        match self {
            ReferrerSource::Direct => "Direct",
            ReferrerSource::Google => "Google",
            ReferrerSource::Bing => "Bing",
            ReferrerSource::Twitter => "Twitter / X",
            ReferrerSource::Facebook => "Facebook",
            ReferrerSource::Instagram => "Instagram",
            ReferrerSource::LinkedIn => "LinkedIn",
            ReferrerSource::Reddit => "Reddit",
            ReferrerSource::YouTube => "YouTube",
            ReferrerSource::GitHub => "GitHub",
            ReferrerSource::Other => "Other",
        }
    }
}

/// 从 URL 提取域名（找 :// 之后、第一个 /:?# 之前的部分）
fn extract_domain(url: &str) -> Option<&str> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    without_scheme
        .split(&['/', ':', '?', '#'][..])
        .next()
        .filter(|s| !s.is_empty())
}

/// 域名是否等于 base 或为其子域
fn domain_matches(domain: &str, base: &str) -> bool {
    domain == base || domain.ends_with(&format!(".{}", base))
}

/// referrer 归类主入口
///
/// 无 referrer 或空串即直接访问；无法解析出域名的归 Other。
pub fn classify_referrer(referrer: Option<&str>) -> ReferrerSource {
    let raw = match referrer {
        Some(r) if !r.trim().is_empty() => r.trim(),
        _ => return ReferrerSource::Direct,
    };

    let Some(domain) = extract_domain(raw) else {
        return ReferrerSource::Other;
    };
    let domain = domain.to_lowercase();

    const PLATFORMS: &[(&str, ReferrerSource)] = &[
        ("google.com", ReferrerSource::Google),
        ("bing.com", ReferrerSource::Bing),
        ("twitter.com", ReferrerSource::Twitter),
        ("x.com", ReferrerSource::Twitter),
        ("t.co", ReferrerSource::Twitter),
        ("facebook.com", ReferrerSource::Facebook),
        ("fb.com", ReferrerSource::Facebook),
        ("instagram.com", ReferrerSource::Instagram),
        ("linkedin.com", ReferrerSource::LinkedIn),
        ("lnkd.in", ReferrerSource::LinkedIn),
        ("reddit.com", ReferrerSource::Reddit),
        ("youtube.com", ReferrerSource::YouTube),
        ("youtu.be", ReferrerSource::YouTube),
        ("github.com", ReferrerSource::GitHub),
    ];

    for (base, source) in PLATFORMS {
        if domain_matches(&domain, base) {
            return *source;
        }
    }

    ReferrerSource::Other
}

/// 设备类型桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Bot,
    Other,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Desktop => "Desktop",
            DeviceType::Bot => "Bot",
            DeviceType::Other => "Other",
        }
    }
}

/// UA 解析结果
#[derive(Debug, Clone)]
pub struct ParsedUserAgent {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
}

impl ParsedUserAgent {
    fn unknown() -> Self {
        Self {
            device_type: DeviceType::Other,
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
        }
    }
}

/// UA 解析主入口（woothee + 平板补判）
pub fn classify_user_agent(user_agent: Option<&str>) -> ParsedUserAgent {
    let ua = match user_agent {
        Some(ua) if !ua.trim().is_empty() => ua,
        _ => return ParsedUserAgent::unknown(),
    };

    let lower = ua.to_lowercase();

    // woothee 不区分平板，先用子串补判
    let tablet = lower.contains("ipad") || lower.contains("tablet");

    match UA_PARSER.parse(ua) {
        Some(result) => {
            let device_type = if tablet {
                DeviceType::Tablet
            } else {
                match result.category {
                    "smartphone" | "mobilephone" => DeviceType::Mobile,
                    "pc" => DeviceType::Desktop,
                    "crawler" => DeviceType::Bot,
                    _ => DeviceType::Other,
                }
            };

            let browser = if result.name.is_empty() || result.name == "UNKNOWN" {
                "Unknown".to_string()
            } else {
                result.name.to_string()
            };

            let os = if result.os.is_empty() || result.os == "UNKNOWN" {
                "Unknown".to_string()
            } else {
                result.os.to_string()
            };

            ParsedUserAgent {
                device_type,
                browser,
                os,
            }
        }
        None => {
            // woothee 认不出来的，尽量从子串兜底分类
            let device_type = if lower.contains("bot")
                || lower.contains("crawler")
                || lower.contains("spider")
            {
                DeviceType::Bot
            } else if tablet {
                DeviceType::Tablet
            } else if lower.contains("mobile")
                || lower.contains("android")
                || lower.contains("iphone")
            {
                DeviceType::Mobile
            } else if lower.contains("windows")
                || lower.contains("macintosh")
                || lower.contains("linux")
            {
                DeviceType::Desktop
            } else {
                DeviceType::Other
            };

            ParsedUserAgent {
                device_type,
                browser: "Unknown".to_string(),
                os: "Unknown".to_string(),
            }
        }
    }
}
