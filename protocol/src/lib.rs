//! Discovery protocol.
//!
//! Every datagram carries exactly one JSON encoded [`DiscoveryPacket`].

mod service_type;

pub use service_type::ServiceType;
pub use service_type::ServiceTypeError;

use bytes::BytesMut;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio_util::codec::Decoder;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryPacket {
    /// Asks every publisher of the service type to announce itself.
    Query { service_type: String },

    /// A named service exists on the sender.
    Announce { service_type: String, name: String },

    /// A named service is being withdrawn.
    Goodbye { service_type: String, name: String },

    /// Asks the publisher of `name` for its port.
    Resolve { service_type: String, name: String },

    /// Answer to [`DiscoveryPacket::Resolve`]. The host is the datagram source.
    Resolved {
        service_type: String,
        name: String,
        port: u16,
    },
}

impl DiscoveryPacket {
    pub fn service_type(&self) -> &str {
        match self {
            Self::Query { service_type }
            | Self::Announce { service_type, .. }
            | Self::Goodbye { service_type, .. }
            | Self::Resolve { service_type, .. }
            | Self::Resolved { service_type, .. } => service_type,
        }
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Default)]
pub struct DiscoveryPacketDecoder;

impl Decoder for DiscoveryPacketDecoder {
    type Item = DiscoveryPacket;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // A datagram is always a whole packet.
        let datagram = src.split();
        Some(serde_json::from_slice(&datagram))
            .transpose()
            .map_err(Into::into)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Error from network I/O")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode as JSON")]
    Json(#[from] serde_json::Error),
}
