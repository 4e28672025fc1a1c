pub mod aggregator;
pub mod chat_poller;
pub mod error;
pub mod project_service;
pub mod projector;
pub mod session;
pub mod status_updates;

pub use chat_poller::{ChatPoller, ChatWatch, PollerState};
pub use error::*;
pub use project_service::*;
pub use projector::*;
pub use session::Session;
pub use status_updates::*;
