//! Default ports and addresses of the webhook server.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// The default port `9443`, the port the operator's webhook has always
/// listened on.
pub const DEFAULT_PORT: u16 = 9443;

/// The default IP address [`Ipv4Addr::UNSPECIFIED`] (`0.0.0.0`) the webhook server binds to,
/// which represents binding on all network addresses.
pub const DEFAULT_LISTEN_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// The default socket address `0.0.0.0:9443` the webhook server binds to.
pub const DEFAULT_SOCKET_ADDR: SocketAddr = SocketAddr::new(DEFAULT_LISTEN_ADDRESS, DEFAULT_PORT);

/// Environment variable holding the console log filter directives.
pub const CONSOLE_LOG_LEVEL_ENV: &str = "CONSOLE_LOG_LEVEL";

/// Path validating admission reviews of every kind.
pub const VALIDATE_PATH: &str = "/validate";

pub const HEALTH_PATH: &str = "/health";
