//! Best-effort discovery of a URL another device can use to reach this server.
//!
//! Candidates are tried in order: a configured public URL, local tunnel agent
//! APIs, then a private LAN address. Failures are never surfaced to callers.

pub mod discovery;
pub mod error;

pub use discovery::{
    is_private_ipv4, normalize_public_url, share_url, DiscoveredLink, InterfaceSource,
    LinkDiscovery, LinkDiscoveryConfig, SystemInterfaces, DEFAULT_TUNNEL_API_URLS,
};
pub use error::{LinkDiscoveryError, Result};
