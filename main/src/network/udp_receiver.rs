use futures_util::Stream;
use futures_util::StreamExt;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use tokio_util::codec::Decoder;
use tokio_util::udp::UdpFramed;

pub trait UdpReceiver {
    /// Binds and joins the group before returning, so datagrams sent afterwards are
    /// never missed. A bind failure is the only item of the stream.
    fn receive<T, C, E>(
        &self,
        multicast_ip: Ipv4Addr,
        port: u16,
        decoder: C,
    ) -> impl Stream<Item = Result<(T, SocketAddr), E>> + Send + 'static
    where
        C: Decoder<Item = T, Error = E> + Send + 'static,
        E: From<std::io::Error> + 'static;
}

pub struct TokioUdpReceiver;

impl UdpReceiver for TokioUdpReceiver {
    fn receive<T, C, E>(
        &self,
        multicast_ip: Ipv4Addr,
        port: u16,
        decoder: C,
    ) -> impl Stream<Item = Result<(T, SocketAddr), E>> + Send + 'static
    where
        C: Decoder<Item = T, Error = E> + Send + 'static,
        E: From<std::io::Error> + 'static,
    {
        match super::multicast::new_receiver_socket(multicast_ip, port) {
            Ok(socket) => UdpFramed::new(socket, decoder).left_stream(),
            Err(e) => {
                futures_util::stream::once(async move { Err::<(T, SocketAddr), E>(e.into()) })
                    .right_stream()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::udp_sender::TokioUdpSender;
    use crate::network::udp_sender::UdpSender;
    use std::net::SocketAddrV4;
    use std::time::Duration;
    use tokio_util::codec::BytesCodec;

    #[tokio::test]
    async fn multicast_sent_before_first_poll() {
        crate::test::init();

        let multicast_ip = *crate::get_discovery_address().ip();
        let port = 50536;
        let address = SocketAddrV4::new(multicast_ip, port);
        let expected_data = vec![1, 2, 3];
        let mut received = TokioUdpReceiver
            .receive(multicast_ip, port, BytesCodec::default())
            .boxed();

        // When
        if let Err(e) = TokioUdpSender.send(address, expected_data.clone().into()).await {
            println!("Multicast unavailable ({}), skipping.", e);
            return;
        }

        // Then
        let (actual_data, _) = match tokio::time::timeout(Duration::from_secs(5), received.next())
            .await
            .expect("Must receive the packet back")
            .unwrap()
        {
            Ok(received) => received,
            Err(e) => {
                println!("Multicast unavailable ({}), skipping.", e);
                return;
            }
        };
        assert_eq!(expected_data, actual_data.to_vec());
    }
}
