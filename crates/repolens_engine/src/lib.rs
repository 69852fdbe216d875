//! Repolens engine: channel clients, HTTP calls and cache persistence.
mod config;
mod engine;
mod persist;
mod poll;
mod push;
mod query;
mod types;

pub use config::{EngineConfig, ReconnectSettings};
pub use engine::{EngineCommand, EngineHandle};
pub use persist::{AtomicFileWriter, ContextStore, PersistError};
pub use poll::{run_status_poll, StatusApi};
pub use push::{backoff_delay, run_push_channel};
pub use query::{AnswerResponse, HttpApi, QueryApi};
pub use types::{parse_frame, ApiError, ChannelEventSink, EngineEvent, EventSink};
