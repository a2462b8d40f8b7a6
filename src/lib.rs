pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod session;
pub mod shared;

pub use error::{Error, LoadError, Result};
pub use pipeline::pattern::InstrumentId;
pub use session::Session;
