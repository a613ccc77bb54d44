//! Error types for link discovery.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkDiscoveryError>;

/// Reasons a single discovery candidate was rejected. `LinkDiscovery::discover`
/// absorbs all of them.
#[derive(Debug, Error)]
pub enum LinkDiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tunnel API returned status {0}")]
    Status(u16),

    #[error("Tunnel API listed no tunnels")]
    NoTunnels,

    #[error("Interface enumeration failed: {0}")]
    Interfaces(#[from] std::io::Error),
}
