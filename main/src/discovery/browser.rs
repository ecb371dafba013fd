use super::registry::DiscoveryEvent;
use super::registry::PeerRegistry;
use super::registry::Reaction;
use super::DiscoveryConfig;
use super::ServerInfo;
use crate::id::IdGenerator;
use crate::network::udp_sender::UdpSender;
use crate::packet::DiscoveryPacketReceiver;
use facingtime_protocol::DiscoveryPacket;
use futures_channel::mpsc::UnboundedReceiver;
use futures_channel::mpsc::UnboundedSender;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Browses for services and keeps the peer list up to date until stopped.
pub struct DiscoveryBrowser {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl DiscoveryBrowser {
    pub fn start(
        config: DiscoveryConfig,
        receiver: &(dyn DiscoveryPacketReceiver + Sync),
        sender: Arc<dyn UdpSender + Send + Sync>,
        peers: Arc<watch::Sender<Vec<ServerInfo>>>,
        id_generator: Box<dyn IdGenerator + Send>,
    ) -> Self {
        log::info!("Browsing for {}", config.service_type);
        let packets = receiver.receive(config.multicast_address);
        let (events_sender, events) = futures_channel::mpsc::unbounded();
        let browse = Browse {
            config,
            registry: PeerRegistry::new(peers, id_generator),
            sender,
            events_sender,
            tasks: JoinSet::new(),
            resolutions: HashMap::default(),
        };
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(browse.run(packets, events, shutdown.clone()));
        Self { shutdown, task }
    }

    /// Whether browsing ended on its own, after a socket failure for example.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels browsing and every pending resolution, then clears the peer list.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            log::warn!("Browser ended abnormally: {}", e);
        }
    }
}

struct Browse {
    config: DiscoveryConfig,
    registry: PeerRegistry,
    sender: Arc<dyn UdpSender + Send + Sync>,
    events_sender: UnboundedSender<DiscoveryEvent>,

    /// Resolutions and probes in flight.
    tasks: JoinSet<()>,
    resolutions: HashMap<String, AbortHandle>,
}

impl Browse {
    async fn run(
        mut self,
        mut packets: BoxStream<'static, std::io::Result<(DiscoveryPacket, SocketAddrV4)>>,
        mut events: UnboundedReceiver<DiscoveryEvent>,
        shutdown: CancellationToken,
    ) {
        let query = DiscoveryPacket::Query {
            service_type: self.config.service_type.to_string(),
        };
        let address = self.config.multicast_address;
        if let Err(e) = super::send_packet(&self.sender, address, &query).await {
            log::warn!("Failed to query for {}: {}", self.config.service_type, e);
        }

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => DiscoveryEvent::Stopped,
                Some(event) = events.next() => event,
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => continue,
                packet = packets.next() => match packet {
                    Some(Ok((packet, source))) => match self.translate(packet, source) {
                        Some(event) => event,
                        None => continue,
                    },
                    Some(Err(e)) => {
                        log::error!("Discovery socket failed: {}", e);
                        DiscoveryEvent::Stopped
                    }
                    None => DiscoveryEvent::Stopped,
                },
            };
            let stopped = event == DiscoveryEvent::Stopped;
            for reaction in self.registry.apply(event) {
                self.react(reaction);
            }
            if stopped {
                break;
            }
        }
        log::info!("Stopped browsing for {}", self.config.service_type);
    }

    fn translate(&self, packet: DiscoveryPacket, source: SocketAddrV4) -> Option<DiscoveryEvent> {
        if packet.service_type() != self.config.service_type.as_str() {
            return None;
        }
        match packet {
            DiscoveryPacket::Announce { name, .. } => Some(DiscoveryEvent::Found { name }),
            DiscoveryPacket::Goodbye { name, .. } => Some(DiscoveryEvent::Removed { name }),
            DiscoveryPacket::Resolved { name, port, .. } if self.registry.is_pending(&name) => {
                Some(DiscoveryEvent::Resolved {
                    name,
                    host: source.ip().to_string(),
                    port,
                })
            }
            DiscoveryPacket::Resolved { name, .. } => {
                log::trace!("Ignoring an unsolicited resolution of {}", name);
                None
            }
            DiscoveryPacket::Query { .. } | DiscoveryPacket::Resolve { .. } => None,
        }
    }

    fn react(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Resolve(name) => {
                let handle = self.tasks.spawn(resolve(
                    name.clone(),
                    self.config.clone(),
                    self.sender.clone(),
                    self.events_sender.clone(),
                ));
                if let Some(previous) = self.resolutions.insert(name, handle) {
                    previous.abort();
                }
            }
            Reaction::CancelResolution(name) => {
                if let Some(handle) = self.resolutions.remove(&name) {
                    handle.abort();
                }
            }
            Reaction::Probe { name, host, port } => {
                self.tasks.spawn(probe(
                    name,
                    host,
                    port,
                    self.config.clone(),
                    self.events_sender.clone(),
                ));
            }
            Reaction::CancelAll => {
                self.resolutions.clear();
                self.tasks.abort_all();
            }
        }
    }
}

/// Asks for the port of `name` and reports a failure once the timeout elapses.
///
/// Success arrives as a packet in the browse loop, which aborts this task.
async fn resolve(
    name: String,
    config: DiscoveryConfig,
    sender: Arc<dyn UdpSender + Send + Sync>,
    events: UnboundedSender<DiscoveryEvent>,
) {
    let packet = DiscoveryPacket::Resolve {
        service_type: config.service_type.to_string(),
        name: name.clone(),
    };
    let reason = match super::send_packet(&sender, config.multicast_address, &packet).await {
        Ok(_) => {
            tokio::time::sleep(config.resolve_timeout).await;
            format!("no answer within {:?}", config.resolve_timeout)
        }
        Err(e) => e.to_string(),
    };
    let _ = events.unbounded_send(DiscoveryEvent::NotResolved { name, reason });
}

async fn probe(
    name: String,
    host: String,
    port: u16,
    config: DiscoveryConfig,
    events: UnboundedSender<DiscoveryEvent>,
) {
    let connection = tokio::time::timeout(
        config.probe_timeout,
        TcpStream::connect((host.as_str(), port)),
    )
    .await;
    let reachable = matches!(connection, Ok(Ok(_)));
    let _ = events.unbounded_send(DiscoveryEvent::Probed {
        name,
        host,
        port,
        reachable,
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discovery::testing::*;
    use crate::id::UuidGenerator;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            resolve_timeout: Duration::from_millis(200),
            probe_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    fn announce(name: &str) -> DiscoveryPacket {
        DiscoveryPacket::Announce {
            service_type: crate::DEFAULT_SERVICE_TYPE.into(),
            name: name.into(),
        }
    }

    fn resolved(name: &str, port: u16) -> DiscoveryPacket {
        DiscoveryPacket::Resolved {
            service_type: crate::DEFAULT_SERVICE_TYPE.into(),
            name: name.into(),
            port,
        }
    }

    fn resolve_request(name: &str) -> DiscoveryPacket {
        DiscoveryPacket::Resolve {
            service_type: crate::DEFAULT_SERVICE_TYPE.into(),
            name: name.into(),
        }
    }

    async fn wait_for(
        peers: &mut watch::Receiver<Vec<ServerInfo>>,
        condition: impl FnMut(&Vec<ServerInfo>) -> bool,
    ) -> Vec<ServerInfo> {
        tokio::time::timeout(Duration::from_secs(5), peers.wait_for(condition))
            .await
            .expect("Timed out waiting for the peer list")
            .expect("Peer list dropped")
            .clone()
    }

    #[tokio::test]
    async fn found_resolved_updated_removed() -> anyhow::Result<()> {
        crate::test::init();

        let (receiver, inbound) = scripted_receiver();
        let (sender, mut sent) = recording_sender();
        let (peers, mut peers_receiver) = watch::channel(Vec::default());
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );
        assert_eq!(
            next_packet(&mut sent).await,
            DiscoveryPacket::Query {
                service_type: crate::DEFAULT_SERVICE_TYPE.into()
            }
        );

        // When
        inbound.unbounded_send(Ok((announce("alice"), source("10.0.0.2:50535")))).unwrap();

        // Then
        assert_eq!(next_packet(&mut sent).await, resolve_request("alice"));
        assert!(peers_receiver.borrow().is_empty());

        // When
        inbound.unbounded_send(Ok((resolved("alice", 8080), source("10.0.0.2:40000")))).unwrap();

        // Then
        let list = wait_for(&mut peers_receiver, |p| p.len() == 1).await;
        assert_eq!(list[0].name, "alice");
        assert_eq!(list[0].url(), "http://10.0.0.2:8080");
        let id = list[0].id.clone();

        // When
        inbound.unbounded_send(Ok((announce("bob"), source("10.0.0.3:50535")))).unwrap();
        assert_eq!(next_packet(&mut sent).await, resolve_request("bob"));
        inbound.unbounded_send(Ok((resolved("bob", 8080), source("10.0.0.3:40000")))).unwrap();
        wait_for(&mut peers_receiver, |p| p.len() == 2).await;
        inbound.unbounded_send(Ok((announce("alice"), source("10.0.0.9:50535")))).unwrap();
        assert_eq!(next_packet(&mut sent).await, resolve_request("alice"));
        inbound.unbounded_send(Ok((resolved("alice", 9090), source("10.0.0.9:40000")))).unwrap();

        // Then
        let list = wait_for(&mut peers_receiver, |p| p.first().map(|a| a.port) == Some(9090)).await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].host, "10.0.0.9");
        assert_eq!(list[1].name, "bob");

        // When
        let goodbye = DiscoveryPacket::Goodbye {
            service_type: crate::DEFAULT_SERVICE_TYPE.into(),
            name: "alice".into(),
        };
        inbound.unbounded_send(Ok((goodbye, source("10.0.0.9:50535")))).unwrap();

        // Then
        let list = wait_for(&mut peers_receiver, |p| p.len() == 1).await;
        assert_eq!(list[0].name, "bob");

        // When
        browser.stop().await;

        // Then
        assert!(peers_receiver.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unsolicited_and_foreign_packets_are_ignored() -> anyhow::Result<()> {
        crate::test::init();

        let (receiver, inbound) = scripted_receiver();
        let (sender, mut sent) = recording_sender();
        let (peers, mut peers_receiver) = watch::channel(Vec::default());
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );
        next_packet(&mut sent).await;

        // When
        inbound.unbounded_send(Ok((resolved("mallory", 8080), source("10.0.0.6:40000")))).unwrap();
        let foreign = DiscoveryPacket::Announce {
            service_type: "_other._tcp.local.".into(),
            name: "carol".into(),
        };
        inbound.unbounded_send(Ok((foreign, source("10.0.0.7:50535")))).unwrap();
        inbound.unbounded_send(Ok((announce("dave"), source("10.0.0.8:50535")))).unwrap();

        // Then
        assert_eq!(next_packet(&mut sent).await, resolve_request("dave"));
        inbound.unbounded_send(Ok((resolved("dave", 8080), source("10.0.0.8:40000")))).unwrap();
        let list = wait_for(&mut peers_receiver, |p| !p.is_empty()).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "dave");

        browser.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn resolution_times_out() -> anyhow::Result<()> {
        crate::test::init();

        let (receiver, inbound) = scripted_receiver();
        let (sender, mut sent) = recording_sender();
        let (peers, peers_receiver) = watch::channel(Vec::default());
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );
        next_packet(&mut sent).await;

        // When
        inbound.unbounded_send(Ok((announce("erin"), source("10.0.0.5:50535")))).unwrap();
        assert_eq!(next_packet(&mut sent).await, resolve_request("erin"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        inbound.unbounded_send(Ok((resolved("erin", 8080), source("10.0.0.5:40000")))).unwrap();

        // Found again after the timeout, so a fresh resolution starts.
        inbound.unbounded_send(Ok((announce("erin"), source("10.0.0.5:50535")))).unwrap();

        // Then
        assert_eq!(next_packet(&mut sent).await, resolve_request("erin"));
        assert!(peers_receiver.borrow().is_empty(), "A late answer must be ignored");

        browser.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn reachable_peer() -> anyhow::Result<()> {
        crate::test::init();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (receiver, inbound) = scripted_receiver();
        let (sender, mut sent) = recording_sender();
        let (peers, mut peers_receiver) = watch::channel(Vec::default());
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );
        next_packet(&mut sent).await;

        // When
        inbound.unbounded_send(Ok((announce("frank"), source("127.0.0.1:50535")))).unwrap();
        next_packet(&mut sent).await;
        inbound.unbounded_send(Ok((resolved("frank", port), source("127.0.0.1:40000")))).unwrap();

        // Then
        let list = wait_for(&mut peers_receiver, |p| p.iter().any(|p| p.is_reachable)).await;
        assert_eq!(list[0].port, port);

        browser.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn listens_before_query() {
        crate::test::init();

        let (receiver, sender, log) = ordered_transport();
        let (peers, _) = watch::channel(Vec::default());

        // When
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );

        // Then
        tokio::time::timeout(Duration::from_secs(5), async {
            while log.lock().unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Query was never sent");
        assert_eq!(*log.lock().unwrap(), ["bound", "sent"]);
        browser.stop().await;
    }

    #[tokio::test]
    async fn socket_failure_stops_browsing() -> anyhow::Result<()> {
        crate::test::init();

        let (receiver, inbound) = scripted_receiver();
        let (sender, mut sent) = recording_sender();
        let (peers, mut peers_receiver) = watch::channel(Vec::default());
        let browser = DiscoveryBrowser::start(
            config(),
            &receiver,
            Arc::new(sender),
            Arc::new(peers),
            Box::new(UuidGenerator),
        );
        next_packet(&mut sent).await;
        inbound.unbounded_send(Ok((announce("gina"), source("10.0.0.4:50535")))).unwrap();
        next_packet(&mut sent).await;
        inbound.unbounded_send(Ok((resolved("gina", 8080), source("10.0.0.4:40000")))).unwrap();
        wait_for(&mut peers_receiver, |p| p.len() == 1).await;

        // When
        let e = std::io::Error::new(std::io::ErrorKind::Other, "interface gone");
        inbound.unbounded_send(Err(e)).unwrap();

        // Then
        wait_for(&mut peers_receiver, |p| p.is_empty()).await;
        browser.stop().await;
        Ok(())
    }
}
