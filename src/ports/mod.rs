pub mod cache;
pub mod config_store;
pub mod photo;
pub mod repository;

pub use cache::*;
pub use config_store::*;
pub use photo::*;
pub use repository::*;
