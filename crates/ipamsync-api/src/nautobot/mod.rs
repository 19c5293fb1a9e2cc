// Nautobot REST API client (IPAM + extras).

pub mod client;
pub mod extras;
pub mod ipam;
pub mod models;

pub use client::NautobotClient;
pub use models::{
    Choice, IdRef, IpAddress, IpAddressWrite, NameRef, NestedRef, Note, Page, Prefix,
    PrefixWrite, Tag, TagWrite,
};

/// Collection path of prefixes, for notes and logging.
pub const PREFIXES: &str = "ipam/prefixes";
/// Collection path of IP addresses, for notes and logging.
pub const IP_ADDRESSES: &str = "ipam/ip-addresses";
