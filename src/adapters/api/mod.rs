pub mod client;
pub mod dto;
pub mod repo;

pub use client::ApiClient;
pub use dto::*;
pub use repo::HttpRepository;
