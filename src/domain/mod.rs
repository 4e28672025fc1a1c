/// Declares a string-backed identifier newtype with the usual conversions.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

pub(crate) use string_id;

pub mod chat;
pub mod error;
pub mod milestone;
pub mod project;
pub mod status_update;
pub mod task;
pub mod user;

pub use chat::*;
pub use error::*;
pub use milestone::*;
pub use project::*;
pub use status_update::*;
pub use task::*;
pub use user::*;

