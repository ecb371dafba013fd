use super::DiscoveryConfig;
use super::DiscoveryError;
use crate::network::udp_sender::UdpSender;
use crate::packet::DiscoveryPacketReceiver;
use facingtime_protocol::DiscoveryPacket;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::net::SocketAddrV4;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The published record of the local server.
///
/// It stays on the network until [`Announcement::withdraw`] is called.
pub struct Announcement {
    responder: Responder,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Announces `name` with `port` and answers queries and resolutions for it.
///
/// Fails when the first announcement cannot be sent.
pub async fn publish(
    config: &DiscoveryConfig,
    name: &str,
    port: u16,
    receiver: &(dyn DiscoveryPacketReceiver + Sync),
    sender: Arc<dyn UdpSender + Send + Sync>,
) -> Result<Announcement, DiscoveryError> {
    let packets = receiver.receive(config.multicast_address);
    let responder = Responder {
        service_type: config.service_type.to_string(),
        name: name.to_string(),
        port,
        multicast_address: config.multicast_address,
        sender,
    };
    responder.send(&responder.announcement()).await?;
    log::info!(
        "Published {} as {} on port {}",
        config.service_type,
        name,
        port
    );

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(responder.clone().run(
        packets,
        config.announce_interval,
        shutdown.clone(),
    ));
    Ok(Announcement {
        responder,
        shutdown,
        task,
    })
}

impl Announcement {
    pub fn name(&self) -> &str {
        &self.responder.name
    }

    /// Stops answering and tells browsers the service is gone.
    pub async fn withdraw(self) -> Result<(), DiscoveryError> {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            log::warn!("Announcement responder ended abnormally: {}", e);
        }
        let goodbye = DiscoveryPacket::Goodbye {
            service_type: self.responder.service_type.clone(),
            name: self.responder.name.clone(),
        };
        self.responder.send(&goodbye).await?;
        log::info!("Withdrew {}", self.responder.name);
        Ok(())
    }
}

#[derive(Clone)]
struct Responder {
    service_type: String,
    name: String,
    port: u16,
    multicast_address: SocketAddrV4,
    sender: Arc<dyn UdpSender + Send + Sync>,
}

impl Responder {
    async fn run(
        self,
        mut packets: BoxStream<'static, std::io::Result<(DiscoveryPacket, SocketAddrV4)>>,
        announce_interval: std::time::Duration,
        shutdown: CancellationToken,
    ) {
        let mut announce_timer =
            tokio::time::interval_at(Instant::now() + announce_interval, announce_interval);
        loop {
            let reply = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = announce_timer.tick() => self.announcement(),
                packet = packets.next() => match packet {
                    Some(Ok((packet, source))) => match self.reply_to(packet) {
                        Some(reply) => {
                            log::debug!("Answering {}", source);
                            reply
                        }
                        None => continue,
                    },
                    Some(Err(e)) => {
                        log::error!(
                            "Discovery socket failed, {} will no longer answer: {}",
                            self.name,
                            e
                        );
                        break;
                    }
                    None => break,
                },
            };
            if let Err(e) = self.send(&reply).await {
                log::warn!("Failed to answer for {}: {}", self.name, e);
            }
        }
    }

    fn reply_to(&self, packet: DiscoveryPacket) -> Option<DiscoveryPacket> {
        if packet.service_type() != self.service_type {
            return None;
        }
        match packet {
            DiscoveryPacket::Query { .. } => Some(self.announcement()),
            DiscoveryPacket::Resolve { name, .. } if name == self.name => {
                Some(DiscoveryPacket::Resolved {
                    service_type: self.service_type.clone(),
                    name,
                    port: self.port,
                })
            }
            _ => None,
        }
    }

    fn announcement(&self) -> DiscoveryPacket {
        DiscoveryPacket::Announce {
            service_type: self.service_type.clone(),
            name: self.name.clone(),
        }
    }

    async fn send(&self, packet: &DiscoveryPacket) -> Result<(), DiscoveryError> {
        super::send_packet(&self.sender, self.multicast_address, packet).await
    }
}
