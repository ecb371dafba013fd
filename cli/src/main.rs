mod client;
mod server;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use facingtime::Settings;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_USERNAME: &str = "Anonymous";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let settings_path = Settings::default_path();
    let settings = match &settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    match Cli::parse().command {
        Command::Serve {
            port,
            name,
            chat_page,
            no_discovery,
        } => {
            let port = port.or(settings.server_port);
            crate::server::serve(port, name, chat_page, !no_discovery).await?
        }
        Command::Discover { seconds } => crate::server::discover(seconds).await?,
        Command::Say {
            server,
            message,
            username,
        } => {
            let username = username
                .or(settings.username)
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
            crate::client::say(server, &username, &message).await?
        }
        Command::Settings { username, port } => {
            let path = settings_path
                .ok_or_else(|| anyhow::anyhow!("No configuration directory on this platform"))?;
            update_settings(settings, &path, username, port)?
        }
    };
    Ok(())
}

fn update_settings(
    mut settings: Settings,
    path: &std::path::Path,
    username: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if username.is_none() && port.is_none() {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }
    if username.is_some() {
        settings.username = username;
    }
    if port.is_some() {
        settings.server_port = port;
    }
    settings.save(path)?;
    Ok(())
}

#[derive(Parser)]
#[command(about = "Chat rooms on the local network")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hosts a chat room until interrupted.
    Serve {
        #[arg(long)]
        port: Option<u16>,

        /// Name announced to other hosts.
        #[arg(long, default_value = facingtime::DEFAULT_INSTANCE_NAME)]
        name: String,

        /// HTML file served instead of the built-in chat page.
        #[arg(long)]
        chat_page: Option<PathBuf>,

        /// Neither announce the room nor browse for others.
        #[arg(long)]
        no_discovery: bool,
    },

    /// Lists chat rooms found on the local network.
    Discover {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },

    /// Posts a message to a chat room.
    Say {
        server: SocketAddr,
        message: String,

        #[arg(long)]
        username: Option<String>,
    },

    /// Shows or updates the saved settings.
    Settings {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}
