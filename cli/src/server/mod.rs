use facingtime::NetworkService;
use facingtime::ServerInfo;
use facingtime::ServiceConfig;
use std::path::PathBuf;
use std::time::Duration;

pub async fn serve(
    port: Option<u16>,
    name: String,
    chat_page: Option<PathBuf>,
    discovery: bool,
) -> anyhow::Result<()> {
    let config = ServiceConfig {
        instance_name: name,
        chat_page,
        announce: discovery,
        ..Default::default()
    };
    let mut service = NetworkService::new(config);
    let mut status = service.status();
    service.start_server(port).await?;
    if let Some(url) = &status.borrow_and_update().local_url {
        println!("Chat room running at {}", url);
    }

    if discovery {
        service.start_discovery();
    }
    let mut peers = service.peers();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = peers.changed() => {
                if changed.is_err() {
                    break;
                }
                print_peers(&peers.borrow_and_update());
            }
        }
    }

    log::info!("Shutting down");
    service.shutdown().await;
    Ok(())
}

pub async fn discover(seconds: u64) -> anyhow::Result<()> {
    let mut service = NetworkService::new(ServiceConfig::default());
    let mut peers = service.peers();
    service.start_discovery();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = peers.changed() => {
                if changed.is_err() {
                    break;
                }
                for peer in peers.borrow_and_update().iter() {
                    log::debug!("Seen {} at {}", peer.name, peer.url());
                }
            }
        }
    }
    let found = peers.borrow().clone();
    service.stop_discovery().await;

    if found.is_empty() {
        println!("No chat rooms found");
    } else {
        print_peers(&found);
    }
    Ok(())
}

fn print_peers(peers: &[ServerInfo]) {
    println!("{} chat room(s) nearby:", peers.len());
    for peer in peers {
        let reachability = if peer.is_reachable {
            "reachable"
        } else {
            "unreachable"
        };
        println!("  {} {} ({})", peer.name, peer.url(), reachability);
    }
}
