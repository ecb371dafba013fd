use anyhow::Context;
use facingtime::HttpRequest;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Posts a message and prints the server's reply.
pub async fn say(server: SocketAddr, username: &str, content: &str) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "username": username,
        "content": content,
    });
    let request = HttpRequest::new("POST", "/api/messages")
        .with_header("Host", server.to_string())
        .with_header("Content-Type", "application/json")
        .with_body(serde_json::to_vec(&body)?);

    let mut stream = TcpStream::connect(server)
        .await
        .with_context(|| format!("Failed to connect to {}", server))?;
    stream.write_all(&request.serialize()).await?;
    let mut response = Vec::default();
    stream.read_to_end(&mut response).await?;

    let (status_code, body) = parse_response(&response)?;
    if status_code != 200 {
        anyhow::bail!("Server answered {}: {}", status_code, body);
    }
    println!("{}", body);
    Ok(())
}

fn parse_response(response: &[u8]) -> anyhow::Result<(u16, &str)> {
    let text = std::str::from_utf8(response).context("Response is not UTF-8")?;
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text, ""));
    let status_code = head
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Missing status line"))?
        .parse()
        .context("Invalid status code")?;
    Ok((status_code, body))
}
