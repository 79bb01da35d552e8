// Transport layer: the notification socket and the REST API.

pub mod connection;
pub mod endpoints;
pub mod error;
pub mod reconnect;
pub mod rest;

pub use connection::{
    ConnectionCommand, ConnectionConfig, ConnectionManager, ConnectionNotification,
    ConnectionState,
};
pub use endpoints::Endpoints;
pub use error::NetError;
pub use reconnect::ReconnectPolicy;
pub use rest::ApiClient;
