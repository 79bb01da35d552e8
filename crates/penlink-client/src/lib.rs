// Session layer of the PenLink client: reconciled messaging state, presence,
// notifications and the task that feeds them from the socket.

pub mod api;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod inbox;
pub mod presence;
pub mod reconciler;
pub mod session;
pub mod storage;

pub use bridge::{spawn_session, BridgeConfig, SessionCommand, SessionHandle};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{ClientSession, SessionOptions};
pub use storage::SessionStore;
