//! Zero-configuration discovery of chat servers on the local network.

mod browser;
mod publisher;
mod registry;

pub use browser::DiscoveryBrowser;
pub use publisher::publish;
pub use publisher::Announcement;

use crate::network::udp_sender::UdpSender;
use facingtime_protocol::DiscoveryPacket;
use facingtime_protocol::ServiceType;
use serde::Serialize;
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub service_type: ServiceType,
    pub multicast_address: SocketAddrV4,

    /// How long a found service may take to answer a resolution.
    pub resolve_timeout: Duration,

    /// How long a reachability probe may take to connect.
    pub probe_timeout: Duration,

    /// Period between unsolicited announcements of a published service.
    pub announce_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: crate::DEFAULT_SERVICE_TYPE
                .parse()
                .expect("Invalid default service type"),
            multicast_address: crate::get_discovery_address(),
            resolve_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            announce_interval: Duration::from_secs(30),
        }
    }
}

/// A resolved peer. Peers are identified by name.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub is_reachable: bool,
}

impl ServerInfo {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to send a discovery packet")]
    Send(#[from] std::io::Error),

    #[error("Failed to encode a discovery packet")]
    Encode(#[from] serde_json::Error),
}

async fn send_packet(
    sender: &Arc<dyn UdpSender + Send + Sync>,
    multicast_address: SocketAddrV4,
    packet: &DiscoveryPacket,
) -> Result<(), DiscoveryError> {
    log::debug!("Sending {:?} to {}", packet, multicast_address);
    let data: Arc<[u8]> = packet.encode_to_vec()?.into();
    sender.send(multicast_address, data).await?;
    Ok(())
}
