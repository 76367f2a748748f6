//! IP 地理位置解析
//!
//! 使用本地 MaxMind GeoLite2-City 数据库。未配置或文件缺失时优雅
//! 降级：构造返回 None，地理维度保持为空，其余功能不受影响。

use std::net::IpAddr;
use std::sync::Arc;

use maxminddb::Reader;
use tracing::{trace, warn};

use crate::config::GeoIpConfig;
use crate::utils::ip::is_private_or_local;

/// 地理查询结果
#[derive(Debug, Clone)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub city: Option<String>,
}

/// MaxMind GeoIP Provider
pub struct GeoIpProvider {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoIpProvider {
    /// 按配置创建；未配置路径或加载失败时返回 None（降级而非报错）
    pub fn from_config(config: &GeoIpConfig) -> Option<Self> {
        let path = config.database_path.as_deref()?.trim();
        if path.is_empty() {
            return None;
        }

        match Reader::open_readfile(path) {
            Ok(reader) => {
                tracing::info!("GeoIP database loaded from: {}", path);
                Some(Self {
                    reader: Arc::new(reader),
                })
            }
            Err(e) => {
                warn!(
                    "Failed to load GeoIP database '{}': {}. Geographic enrichment disabled.",
                    path, e
                );
                None
            }
        }
    }

    /// 解析 IP 到国家/城市
    ///
    /// 私有/本地地址直接跳过；任何解析失败都返回 None。
    pub fn lookup(&self, ip: &str) -> Option<GeoLocation> {
        let ip_addr: IpAddr = ip.parse().ok()?;

        if is_private_or_local(&ip_addr) {
            return None;
        }

        let result = self.reader.lookup(ip_addr).ok()?;
        let city: maxminddb::geoip2::City = result.decode().ok()??;

        let country = city
            .country
            .names
            .english
            .map(String::from)
            .or_else(|| city.country.iso_code.map(String::from));
        let city_name = city.city.names.english.map(String::from);

        trace!(
            "GeoIP lookup for {}: country={:?}, city={:?}",
            ip,
            country,
            city_name
        );

        Some(GeoLocation {
            country,
            city: city_name,
        })
    }
}
