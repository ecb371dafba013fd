use crate::network::udp_receiver::UdpReceiver;
use facingtime_protocol::DecodeError;
use facingtime_protocol::DiscoveryPacket;
use facingtime_protocol::DiscoveryPacketDecoder;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use mockall::automock;
use std::net::SocketAddr;
use std::net::SocketAddrV4;

#[automock]
pub trait DiscoveryPacketReceiver {
    /// The socket is listening once this returns.
    fn receive(&self, multicast_address: SocketAddrV4)
        -> BoxStream<'static, std::io::Result<(DiscoveryPacket, SocketAddrV4)>>;
}

impl<T> DiscoveryPacketReceiver for T
where
    T: UdpReceiver + Send,
{
    fn receive(
        &self,
        multicast_address: SocketAddrV4,
    ) -> BoxStream<'static, std::io::Result<(DiscoveryPacket, SocketAddrV4)>> {
        UdpReceiver::receive(
            self,
            *multicast_address.ip(),
            multicast_address.port(),
            DiscoveryPacketDecoder,
        )
        .filter_map(|r| async { strip_json_error(r) })
        .filter_map(|r| async { extract_ipv4(r) })
        .boxed()
    }
}

fn strip_json_error(
    result: Result<(DiscoveryPacket, SocketAddr), DecodeError>,
) -> Option<std::io::Result<(DiscoveryPacket, SocketAddr)>> {
    match result {
        Ok(inner) => Some(Ok(inner)),
        Err(DecodeError::Io(e)) => Some(Err(e)),
        Err(DecodeError::Json(e)) => {
            log::debug!("Invalid JSON datagram for `DiscoveryPacket`: {}", e);
            None
        }
    }
}

fn extract_ipv4(
    result: std::io::Result<(DiscoveryPacket, SocketAddr)>,
) -> Option<std::io::Result<(DiscoveryPacket, SocketAddrV4)>> {
    match result {
        Ok((_, SocketAddr::V6(_))) => {
            log::debug!("Dropping a packet from IPv6");
            None
        }
        Ok((packet, SocketAddr::V4(addr))) => Some(Ok((packet, addr))),
        Err(e) => Some(Err(e)),
    }
}
