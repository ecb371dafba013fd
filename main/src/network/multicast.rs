use socket2::Domain;
use socket2::Protocol;
use socket2::Socket;
use socket2::Type;
use std::net::Ipv4Addr;
use std::net::SocketAddrV4;
use std::net::UdpSocket as StdUdpSocket;
use tokio::net::UdpSocket;

/// Datagrams never cross a router.
const MULTICAST_TTL: u32 = 1;

/// Socket receiving datagrams sent to `multicast_ip:port`.
///
/// Several receivers in the same host (a publisher and a browser for example)
/// may share the port.
pub fn new_receiver_socket(multicast_ip: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = new_multicast_socket()?;
    socket.set_reuse_address(true)?;
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    socket.set_reuse_port(true)?;
    let local_address = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&local_address.into())?;
    socket.join_multicast_v4(&multicast_ip, &Ipv4Addr::UNSPECIFIED)?;
    log::info!(
        "Multicast receiver socket listening at {} in group {}",
        local_address,
        multicast_ip
    );
    new_async_socket(socket)
}

/// Socket sending datagrams to multicast groups from an ephemeral port.
pub fn new_sender_socket() -> std::io::Result<UdpSocket> {
    let socket = new_multicast_socket()?;
    socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
    new_async_socket(socket)
}

fn new_multicast_socket() -> std::io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    // Instances on the same host must see each other.
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

fn new_async_socket(socket: Socket) -> std::io::Result<UdpSocket> {
    let socket: StdUdpSocket = socket.into();
    socket.try_into()
}
