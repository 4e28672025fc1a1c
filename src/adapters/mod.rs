pub mod api;
pub mod cache;
pub mod config;
pub mod media;
pub mod tui;
