//! Configuration, file system paths, and logging setup for the Ministry Media portal.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, SessionSettings, DEFAULT_SUPABASE_ANON_KEY, DEFAULT_SUPABASE_URL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
