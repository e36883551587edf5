//! phenomatch-engine — runs catalog loading and matching off the caller's
//! thread, correlating replies by request id, with a synchronous
//! in-process fallback when the worker cannot be started.

pub mod config;
pub mod engine;
mod worker;

pub use config::{Config, ConfigError};
pub use engine::{EngineError, LoadState, MatcherOptions, PhenotypeMatcher};
