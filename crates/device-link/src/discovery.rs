use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::{LinkDiscoveryError, Result};

/// Local tunnel agent APIs, queried in order.
pub const DEFAULT_TUNNEL_API_URLS: [&str; 2] = [
    "http://127.0.0.1:4040/api/tunnels",
    "http://127.0.0.1:4041/api/tunnels",
];

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1_500);
const DEFAULT_PORT: u16 = 8088;

#[derive(Debug, Clone)]
pub struct LinkDiscoveryConfig {
    /// Operator-supplied base URL. Wins over everything else when set.
    pub public_url: Option<String>,
    pub tunnel_api_urls: Vec<String>,
    /// Applied to each tunnel lookup separately.
    pub lookup_timeout: Duration,
    /// LAN addresses are never offered in production.
    pub production: bool,
    /// Port advertised in LAN links.
    pub port: u16,
}

impl Default for LinkDiscoveryConfig {
    fn default() -> Self {
        Self {
            public_url: None,
            tunnel_api_urls: DEFAULT_TUNNEL_API_URLS
                .iter()
                .map(|url| url.to_string())
                .collect(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            production: false,
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredLink {
    /// Reachable from anywhere: override or tunnel.
    Public(String),
    /// Reachable only from the same network.
    Lan(String),
}

impl DiscoveredLink {
    pub fn url(&self) -> &str {
        match self {
            Self::Public(url) | Self::Lan(url) => url,
        }
    }
}

/// Source of this host's IPv4 addresses.
pub trait InterfaceSource: Send + Sync {
    fn ipv4_addrs(&self) -> Result<Vec<Ipv4Addr>>;
}

/// Enumerates the host's non-loopback interfaces.
#[derive(Debug, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn ipv4_addrs(&self) -> Result<Vec<Ipv4Addr>> {
        let addrs = if_addrs::get_if_addrs()?
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .collect();
        Ok(addrs)
    }
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<Tunnel>,
}

#[derive(Debug, Deserialize)]
struct Tunnel {
    #[serde(default)]
    public_url: Option<String>,
}

/// 10/8, 172.16/12 and 192.168/16.
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    !ip.is_loopback() && ip.is_private()
}

pub fn normalize_public_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Link that opens the app and adopts `token` on the receiving device.
pub fn share_url(base: &str, token: &str) -> String {
    format!(
        "{}/?token={}",
        base.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

fn pick_tunnel(tunnels: Vec<Tunnel>) -> Option<String> {
    let urls: Vec<String> = tunnels
        .into_iter()
        .filter_map(|t| t.public_url)
        .filter_map(|url| normalize_public_url(&url))
        .collect();
    let https = urls.iter().position(|url| url.starts_with("https://"));
    urls.into_iter().nth(https.unwrap_or(0))
}

pub struct LinkDiscovery {
    config: LinkDiscoveryConfig,
    client: reqwest::Client,
    interfaces: Arc<dyn InterfaceSource>,
}

impl LinkDiscovery {
    pub fn new(config: LinkDiscoveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.lookup_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            interfaces: Arc::new(SystemInterfaces),
        })
    }

    pub fn with_interfaces(mut self, interfaces: Arc<dyn InterfaceSource>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn config(&self) -> &LinkDiscoveryConfig {
        &self.config
    }

    /// Returns the best reachable base URL, or `None` when nothing qualifies.
    pub async fn discover(&self) -> Option<DiscoveredLink> {
        if let Some(url) = self
            .config
            .public_url
            .as_deref()
            .and_then(normalize_public_url)
        {
            return Some(DiscoveredLink::Public(url));
        }

        for api_url in &self.config.tunnel_api_urls {
            match self.query_tunnel(api_url).await {
                Ok(url) => {
                    debug!("[Link] Using tunnel from {}", api_url);
                    return Some(DiscoveredLink::Public(url));
                }
                Err(e) => debug!("[Link] Tunnel lookup {} failed: {}", api_url, e),
            }
        }

        if self.config.production {
            return None;
        }

        match self.lan_address() {
            Ok(Some(ip)) => Some(DiscoveredLink::Lan(format!(
                "http://{}:{}",
                ip, self.config.port
            ))),
            Ok(None) => {
                debug!("[Link] No private IPv4 interface found");
                None
            }
            Err(e) => {
                debug!("[Link] {}", e);
                None
            }
        }
    }

    async fn query_tunnel(&self, api_url: &str) -> Result<String> {
        let response = self
            .client
            .get(api_url)
            .timeout(self.config.lookup_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LinkDiscoveryError::Status(status.as_u16()));
        }
        let list: TunnelList = response.json().await?;
        pick_tunnel(list.tunnels).ok_or(LinkDiscoveryError::NoTunnels)
    }

    fn lan_address(&self) -> Result<Option<Ipv4Addr>> {
        Ok(self
            .interfaces
            .ipv4_addrs()?
            .into_iter()
            .find(is_private_ipv4))
    }
}
