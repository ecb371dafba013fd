use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use mockall::automock;
use std::net::SocketAddrV4;
use std::sync::Arc;

#[automock]
pub trait UdpSender {
    fn send(
        &self,
        multicast_address: SocketAddrV4,
        data: Arc<[u8]>,
    ) -> BoxFuture<'static, std::io::Result<()>>;
}

pub struct TokioUdpSender;

impl TokioUdpSender {
    async fn send(multicast_address: SocketAddrV4, data: Arc<[u8]>) -> std::io::Result<()> {
        let socket = super::multicast::new_sender_socket()?;
        log::trace!("Created `UdpSender` socket at {:?}", socket.local_addr()?);
        socket.send_to(&data, multicast_address).await?;
        Ok(())
    }
}

impl UdpSender for TokioUdpSender {
    fn send(
        &self,
        multicast_address: SocketAddrV4,
        data: Arc<[u8]>,
    ) -> BoxFuture<'static, std::io::Result<()>> {
        Self::send(multicast_address, data).boxed()
    }
}
