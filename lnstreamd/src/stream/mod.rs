//! The stream-payment engine.
//!
//! Every registered stream is driven by its own task (see [`actor`]), which owns the stream's
//! runtime state and receives control operations over a channel. [`StreamEngine`] is the
//! control surface used by the rest of the application.

mod actor;
pub mod engine;
pub mod model;

use thiserror::Error;

use crate::persist::PersistError;

pub use engine::{EngineSettings, StreamEngine};
pub use model::{StartDefaults, StreamParams, StreamSnapshot, StreamStatus, TotalParts};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error("unknown stream {0}")]
    NotFound(String),
    #[error("invalid stream parameters: {0}")]
    InvalidParams(String),
    #[error("stream {0} has stopped")]
    Stopped(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
