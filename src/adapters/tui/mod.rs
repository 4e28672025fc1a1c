pub mod app;
pub mod event;

pub use app::{run_tui, App};
