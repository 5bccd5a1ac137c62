mod config;
mod error;
mod types;

pub use config::*;
pub use error::{MiniError, Result};
pub use types::*;
