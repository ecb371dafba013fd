mod chat;
mod discovery;
mod http;
mod id;
mod listener;
mod network;
mod packet;
mod router;
mod service;
mod settings;
mod static_content;

use std::net::Ipv4Addr;
use std::net::SocketAddrV4;

pub use chat::ChatMessage;
pub use chat::ChatStore;
pub use discovery::DiscoveryConfig;
pub use discovery::DiscoveryError;
pub use discovery::ServerInfo;
pub use facingtime_protocol::ServiceType;
pub use http::HttpRequest;
pub use http::HttpResponse;
pub use listener::HttpServer;
pub use listener::ServerError;
pub use network::lan_address::lan_ip_address;
pub use router::Router;
pub use service::NetworkService;
pub use service::ServiceConfig;
pub use service::ServiceStatus;
pub use settings::Settings;
pub use settings::SettingsError;

/// Instance name announced when none is configured.
pub const DEFAULT_INSTANCE_NAME: &str = "FacingTime";

/// Service type shared by every publisher and browser.
pub const DEFAULT_SERVICE_TYPE: &str = "_facingtime._tcp.local.";

pub const DEFAULT_PORT: u16 = 8080;

/// IPv4 multicast group used for discovery.
///
/// The group lies in the administratively scoped block and datagrams are sent
/// with a TTL of 1, so discovery never leaves the local subnet.
fn get_discovery_address() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(239, 255, 70, 84), 50535)
}
