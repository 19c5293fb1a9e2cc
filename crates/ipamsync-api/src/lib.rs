// ipamsync-api: Async Rust clients for Bluecat Address Manager (v1 REST) and Nautobot

pub mod bluecat;
pub mod error;
pub mod nautobot;
pub mod transport;

pub use bluecat::BluecatClient;
pub use error::Error;
pub use nautobot::NautobotClient;
pub use transport::{TlsMode, TransportConfig};
