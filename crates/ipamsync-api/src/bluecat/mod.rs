// Bluecat Address Manager v1 REST API client.

pub mod auth;
pub mod client;
pub mod entities;
pub mod models;

pub use auth::parse_login_response;
pub use client::BluecatClient;
pub use entities::CONFIGURATION_TYPE;
pub use models::{ApiEntity, parse_properties};
