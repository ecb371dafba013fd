use std::net::IpAddr;
use std::net::Ipv4Addr;

/// Returned when no LAN-facing address can be found.
pub const FALLBACK_ADDRESS: &str = "localhost";

/// Name prefixes of wired and wireless interfaces on macOS, Linux and BSD.
const LAN_INTERFACE_PREFIXES: [&str; 3] = ["en", "eth", "wl"];

/// IPv4 address of the first Ethernet or Wi-Fi interface, or [`FALLBACK_ADDRESS`].
pub fn lan_ip_address() -> String {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let candidates = interfaces.into_iter().map(|i| {
                let ip = i.ip();
                (i.name, ip)
            });
            match select_lan_address(candidates) {
                Some(ip) => ip.to_string(),
                None => {
                    log::warn!("No LAN interface found, falling back to {}", FALLBACK_ADDRESS);
                    FALLBACK_ADDRESS.to_string()
                }
            }
        }
        Err(e) => {
            log::warn!("Failed to enumerate network interfaces: {}", e);
            FALLBACK_ADDRESS.to_string()
        }
    }
}

fn select_lan_address(interfaces: impl IntoIterator<Item = (String, IpAddr)>) -> Option<Ipv4Addr> {
    interfaces
        .into_iter()
        .filter(|(name, _)| LAN_INTERFACE_PREFIXES.iter().any(|p| name.starts_with(p)))
        .find_map(|(_, ip)| match ip {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
}

#[cfg(test)]
mod test {
    use super::*;

    fn interface(name: &str, ip: &str) -> (String, IpAddr) {
        (name.to_string(), ip.parse().unwrap())
    }

    #[test]
    fn first_lan_ipv4() {
        let interfaces = vec![
            interface("lo", "127.0.0.1"),
            interface("en0", "fe80::1"),
            interface("docker0", "172.17.0.1"),
            interface("en0", "192.168.1.20"),
            interface("wlan0", "10.0.0.5"),
        ];

        // When
        let address = select_lan_address(interfaces);

        // Then
        assert_eq!(address, Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn linux_names() {
        assert_eq!(
            select_lan_address(vec![interface("eth0", "10.1.2.3")]),
            Some(Ipv4Addr::new(10, 1, 2, 3))
        );
        assert_eq!(
            select_lan_address(vec![interface("wlp2s0", "10.1.2.4")]),
            Some(Ipv4Addr::new(10, 1, 2, 4))
        );
    }

    #[test]
    fn no_lan_interface() {
        let interfaces = vec![
            interface("lo", "127.0.0.1"),
            interface("utun3", "10.8.0.2"),
        ];
        assert_eq!(select_lan_address(interfaces), None);
    }

    #[test]
    fn always_returns_something() {
        let address = lan_ip_address();
        assert!(address == FALLBACK_ADDRESS || address.parse::<Ipv4Addr>().is_ok());
    }
}
