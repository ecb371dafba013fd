use crate::http::HttpRequest;
use crate::router::Router;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpSocket;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const RECEIVE_BUFFER_SIZE: usize = 65536;
const LISTEN_BACKLOG: u32 = 1024;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {address}")]
    Bind {
        address: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is already running")]
    AlreadyRunning,
}

/// A running HTTP server.
///
/// Every connection gets exactly one response and is then closed.
pub struct HttpServer {
    local_address: SocketAddr,
    shutdown: CancellationToken,
    accept_loop: JoinHandle<()>,
}

impl HttpServer {
    /// Binds `0.0.0.0:port` and starts accepting connections.
    ///
    /// Port 0 picks an ephemeral port, see [`HttpServer::port`].
    pub fn start(port: u16, router: Router) -> Result<Self, ServerError> {
        let address = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let listener = bind(address).map_err(|source| ServerError::Bind { address, source })?;
        let local_address = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;
        log::info!("HTTP server listening on {}", local_address);

        let shutdown = CancellationToken::new();
        let accept_loop = tokio::spawn(accept_connections(
            listener,
            Arc::new(router),
            shutdown.clone(),
        ));
        Ok(Self {
            local_address,
            shutdown,
            accept_loop,
        })
    }

    pub fn port(&self) -> u16 {
        self.local_address.port()
    }

    /// Closes the listening socket and aborts every open connection.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.accept_loop.await {
            log::warn!("Accept loop ended abnormally: {}", e);
        }
        log::info!("HTTP server on {} stopped", self.local_address);
    }
}

fn bind(address: SocketAddrV4) -> std::io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(address.into())?;
    socket.listen(LISTEN_BACKLOG)
}

async fn accept_connections(
    listener: TcpListener,
    router: Arc<Router>,
    shutdown: CancellationToken,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((socket, remote_address)) => {
                    log::debug!("Accepted connection from {}", remote_address);
                    let router = router.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(socket, &router).await {
                            log::debug!("Connection from {} failed: {}", remote_address, e);
                        }
                        log::debug!("Closed connection from {}", remote_address);
                    });
                }
                Err(e) => {
                    log::warn!("Failed to accept a connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }
    drop(listener);
    log::debug!("Aborting {} open connections", connections.len());
    connections.shutdown().await;
}

async fn handle_connection(mut socket: TcpStream, router: &Router) -> std::io::Result<()> {
    let mut buffer = vec![0; RECEIVE_BUFFER_SIZE];
    loop {
        let received = socket.read(&mut buffer).await?;
        if received == 0 {
            return Ok(());
        }

        // Each read is treated as a whole request.
        let Some(request) = HttpRequest::parse(&buffer[..received]) else {
            log::debug!("Dropping {} bytes that are not a request", received);
            continue;
        };
        log::debug!("{} {}", request.method(), request.path());
        let response = router.route(&request);
        socket.write_all(&response.serialize()).await?;
        socket.shutdown().await?;
        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chat::ChatStore;

    fn start() -> HttpServer {
        crate::test::init();

        let router = Router::new(Arc::new(ChatStore::default()), "<html></html>".into());
        HttpServer::start(0, router).unwrap()
    }

    async fn exchange(port: u16, request: &[u8]) -> anyhow::Result<String> {
        let mut socket = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await?;
        socket.write_all(request).await?;
        let mut response = Vec::default();
        socket.read_to_end(&mut response).await?;
        Ok(String::from_utf8(response)?)
    }

    #[tokio::test]
    async fn status() -> anyhow::Result<()> {
        let server = start();

        // When
        let request = b"GET /api/status HTTP/1.1\r\nHost: x\r\n\r\n";
        let response = exchange(server.port(), request).await?;

        // Then
        let body = r#"{"status":"running","service":"FacingTime WebServer","version":"1.0.0"}"#;
        assert_eq!(
            response,
            format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\
                Content-Type: application/json\r\n\r\n{}",
                body.len(),
                body
            )
        );

        server.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn post_then_get() -> anyhow::Result<()> {
        let server = start();
        let body = r#"{"username":"a","content":"b"}"#;
        let post = format!(
            "POST /api/messages HTTP/1.1\r\nContent-Type: application/json\r\n\
            Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        // When
        let posted = exchange(server.port(), post.as_bytes()).await?;
        let listed = exchange(server.port(), b"GET /api/messages HTTP/1.1\r\n\r\n").await?;

        // Then
        assert!(posted.starts_with("HTTP/1.1 200 OK\r\n"), "{}", posted);
        assert!(listed.contains(r#""username":"a","content":"b""#), "{}", listed);

        server.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_route() -> anyhow::Result<()> {
        let server = start();

        // When
        let response = exchange(server.port(), b"GET /does-not-exist HTTP/1.1\r\n\r\n").await?;

        // Then
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("\r\n\r\nNot Found"));

        server.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn garbage_gets_no_response() -> anyhow::Result<()> {
        let server = start();
        let mut socket = TcpStream::connect((Ipv4Addr::LOCALHOST, server.port())).await?;

        // When
        socket.write_all(b"\xff\xfe\xfd").await?;
        socket.shutdown().await?;
        let mut response = Vec::default();
        socket.read_to_end(&mut response).await?;

        // Then
        assert!(response.is_empty());

        server.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn stop_aborts_open_connections() -> anyhow::Result<()> {
        let server = start();
        let port = server.port();
        let mut idle = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // When
        server.stop().await;

        // Then
        let mut buffer = Vec::default();
        let read =
            tokio::time::timeout(Duration::from_secs(5), idle.read_to_end(&mut buffer)).await?;
        assert!(read.map(|n| n == 0).unwrap_or(true), "Idle connection must be closed");
        assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn port_in_use() -> anyhow::Result<()> {
        crate::test::init();
        let occupied = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        let port = occupied.local_addr()?.port();
        let router = Router::new(Arc::new(ChatStore::default()), String::new());

        // When
        let result = HttpServer::start(port, router);

        // Then
        match result {
            Err(ServerError::Bind { address, .. }) => assert_eq!(address.port(), port),
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Binding an occupied port must fail"),
        }
        Ok(())
    }
}
