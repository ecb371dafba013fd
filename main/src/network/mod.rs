pub mod lan_address;
pub mod multicast;
pub mod udp_receiver;
pub mod udp_sender;
