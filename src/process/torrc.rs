//! torrc template rendering

use crate::platform::ControlTransport;
use std::path::PathBuf;

/// Default torrc for platforms with local control sockets
pub const TORRC_TEMPLATE_SOCKET: &str = "\
DataDirectory {{data_directory}}
SocksPort {{socks_port}}
ControlSocket {{control_socket}}
CookieAuthentication 1
CookieAuthFile {{cookie_auth_file}}
AvoidDiskWrites 1
Log notice stdout
GeoIPFile {{geo_ip_file}}
GeoIPv6File {{geo_ipv6_file}}
";

/// Default torrc for platforms that need a TCP control port
pub const TORRC_TEMPLATE_PORT: &str = "\
DataDirectory {{data_directory}}
SocksPort {{socks_port}}
ControlPort {{control_port}}
CookieAuthentication 1
CookieAuthFile {{cookie_auth_file}}
AvoidDiskWrites 1
Log notice stdout
GeoIPFile {{geo_ip_file}}
GeoIPv6File {{geo_ipv6_file}}
";

pub fn default_template(transport: ControlTransport) -> &'static str {
    match transport {
        ControlTransport::TcpPort => TORRC_TEMPLATE_PORT,
        ControlTransport::Socket => TORRC_TEMPLATE_SOCKET,
    }
}

/// Values substituted into a torrc template
#[derive(Debug, Clone)]
pub struct TorrcValues {
    pub data_directory: PathBuf,
    pub control_port: Option<u16>,
    pub control_socket: Option<PathBuf>,
    pub cookie_auth_file: PathBuf,
    pub geo_ip_file: PathBuf,
    pub geo_ipv6_file: PathBuf,
    pub socks_port: u16,
}

/// Replace every `{{placeholder}}`; absent values render empty
pub fn render(template: &str, values: &TorrcValues) -> String {
    let control_port = values
        .control_port
        .map(|p| p.to_string())
        .unwrap_or_default();
    let control_socket = values
        .control_socket
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    template
        .replace(
            "{{data_directory}}",
            &values.data_directory.display().to_string(),
        )
        .replace("{{control_port}}", &control_port)
        .replace("{{control_socket}}", &control_socket)
        .replace(
            "{{cookie_auth_file}}",
            &values.cookie_auth_file.display().to_string(),
        )
        .replace("{{geo_ip_file}}", &values.geo_ip_file.display().to_string())
        .replace(
            "{{geo_ipv6_file}}",
            &values.geo_ipv6_file.display().to_string(),
        )
        .replace("{{socks_port}}", &values.socks_port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> TorrcValues {
        TorrcValues {
            data_directory: PathBuf::from("/tmp/onionport-tor-x"),
            control_port: None,
            control_socket: Some(PathBuf::from("/tmp/onionport-tor-x/control_socket")),
            cookie_auth_file: PathBuf::from("/tmp/onionport-tor-x/cookie"),
            geo_ip_file: PathBuf::from("/usr/share/tor/geoip"),
            geo_ipv6_file: PathBuf::from("/usr/share/tor/geoip6"),
            socks_port: 41234,
        }
    }

    #[test]
    fn test_render_socket_template() {
        let torrc = render(TORRC_TEMPLATE_SOCKET, &values());
        assert!(torrc.contains("DataDirectory /tmp/onionport-tor-x\n"));
        assert!(torrc.contains("ControlSocket /tmp/onionport-tor-x/control_socket\n"));
        assert!(torrc.contains("CookieAuthFile /tmp/onionport-tor-x/cookie\n"));
        assert!(torrc.contains("GeoIPv6File /usr/share/tor/geoip6\n"));
        assert!(torrc.contains("SocksPort 41234\n"));
        assert!(!torrc.contains("{{"));
    }

    #[test]
    fn test_render_port_template() {
        let mut values = values();
        values.control_port = Some(41235);
        values.control_socket = None;

        let torrc = render(default_template(ControlTransport::TcpPort), &values);
        assert!(torrc.contains("ControlPort 41235\n"));
        assert!(!torrc.contains("ControlSocket"));
    }

    #[test]
    fn test_missing_value_renders_empty() {
        let torrc = render("ControlPort {{control_port}}", &values());
        assert_eq!(torrc, "ControlPort ");
    }
}
