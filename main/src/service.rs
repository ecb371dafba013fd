use crate::chat::ChatStore;
use crate::discovery::publish;
use crate::discovery::Announcement;
use crate::discovery::DiscoveryBrowser;
use crate::discovery::DiscoveryConfig;
use crate::discovery::ServerInfo;
use crate::id::UuidGenerator;
use crate::listener::HttpServer;
use crate::listener::ServerError;
use crate::network::lan_address::lan_ip_address;
use crate::network::udp_receiver::TokioUdpReceiver;
use crate::network::udp_sender::TokioUdpSender;
use crate::network::udp_sender::UdpSender;
use crate::packet::DiscoveryPacketReceiver;
use crate::router::Router;
use crate::static_content::load_chat_page;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name announced to peers.
    pub instance_name: String,

    /// Port used when [`NetworkService::start_server`] is given none.
    pub default_port: u16,

    /// Replaces the built-in chat page when readable.
    pub chat_page: Option<PathBuf>,

    /// Whether a started server is published to browsers.
    pub announce: bool,

    pub discovery: DiscoveryConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_name: crate::DEFAULT_INSTANCE_NAME.to_string(),
            default_port: crate::DEFAULT_PORT,
            chat_page: None,
            announce: true,
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Snapshot of the local server as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub is_running: bool,
    pub port: Option<u16>,
    pub local_ip: Option<String>,
    pub local_url: Option<String>,
}

/// Owns the chat server, its announcement and the peer browser.
///
/// Front ends observe it through [`NetworkService::status`] and
/// [`NetworkService::peers`].
pub struct NetworkService {
    config: ServiceConfig,
    receiver: Box<dyn DiscoveryPacketReceiver + Send + Sync>,
    sender: Arc<dyn UdpSender + Send + Sync>,
    server: Option<HttpServer>,
    announcement: Option<Announcement>,
    browser: Option<DiscoveryBrowser>,
    status: watch::Sender<ServiceStatus>,
    peers: Arc<watch::Sender<Vec<ServerInfo>>>,
}

impl NetworkService {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_transport(config, Box::new(TokioUdpReceiver), Arc::new(TokioUdpSender))
    }

    fn with_transport(
        config: ServiceConfig,
        receiver: Box<dyn DiscoveryPacketReceiver + Send + Sync>,
        sender: Arc<dyn UdpSender + Send + Sync>,
    ) -> Self {
        let (status, _) = watch::channel(ServiceStatus::default());
        let (peers, _) = watch::channel(Vec::default());
        Self {
            config,
            receiver,
            sender,
            server: None,
            announcement: None,
            browser: None,
            status,
            peers: Arc::new(peers),
        }
    }

    pub fn status(&self) -> watch::Receiver<ServiceStatus> {
        self.status.subscribe()
    }

    pub fn peers(&self) -> watch::Receiver<Vec<ServerInfo>> {
        self.peers.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Starts the chat server with an empty chat log and publishes it.
    ///
    /// Returns the bound port. A failed publication is logged and does not fail the start.
    pub async fn start_server(&mut self, port: Option<u16>) -> Result<u16, ServerError> {
        if self.server.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let chat_page = load_chat_page(self.config.chat_page.as_deref());
        let router = Router::new(Arc::new(ChatStore::default()), chat_page);
        let server = HttpServer::start(port.unwrap_or(self.config.default_port), router)?;
        let port = server.port();
        self.server = Some(server);

        let local_ip = lan_ip_address();
        let local_url = format!("http://{}:{}", local_ip, port);
        log::info!("Chat room available at {}", local_url);
        self.status.send_replace(ServiceStatus {
            is_running: true,
            port: Some(port),
            local_ip: Some(local_ip),
            local_url: Some(local_url),
        });

        if !self.config.announce {
            log::info!("Not announcing {}", self.config.instance_name);
            return Ok(port);
        }
        match publish(
            &self.config.discovery,
            &self.config.instance_name,
            port,
            self.receiver.as_ref(),
            self.sender.clone(),
        )
        .await
        {
            Ok(announcement) => self.announcement = Some(announcement),
            Err(e) => log::warn!("Failed to publish {}: {}", self.config.instance_name, e),
        }
        Ok(port)
    }

    /// Withdraws the announcement, then closes the server and all its connections.
    pub async fn stop_server(&mut self) {
        if let Some(announcement) = self.announcement.take() {
            if let Err(e) = announcement.withdraw().await {
                log::warn!("Failed to withdraw {}: {}", self.config.instance_name, e);
            }
        }
        match self.server.take() {
            Some(server) => server.stop().await,
            None => log::debug!("Server is not running"),
        }
        self.status.send_replace(ServiceStatus::default());
    }

    /// Starts browsing for peers. Socket failures end browsing and are logged.
    /// A browser that already ended is replaced.
    pub fn start_discovery(&mut self) {
        match &self.browser {
            Some(browser) if !browser.is_finished() => {
                log::debug!("Discovery is already running");
                return;
            }
            Some(_) => log::info!("Restarting discovery"),
            None => {}
        }
        self.browser = Some(DiscoveryBrowser::start(
            self.config.discovery.clone(),
            self.receiver.as_ref(),
            self.sender.clone(),
            self.peers.clone(),
            Box::new(UuidGenerator),
        ));
    }

    /// Stops browsing and clears the peer list.
    pub async fn stop_discovery(&mut self) {
        if let Some(browser) = self.browser.take() {
            browser.stop().await;
        }
    }

    pub async fn shutdown(&mut self) {
        self.stop_server().await;
        self.stop_discovery().await;
    }
}
