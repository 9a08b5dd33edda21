// promptmap/src/lib.rs
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod record;
pub mod tree;
pub mod aggregate;
pub mod render;

pub mod util;
pub mod helpers;
pub mod analyze;
pub mod record_file;
pub mod discover;
pub mod config;

pub mod commands;

pub use aggregate::{Aggregator, CancelToken, DiagnosticSink, Emitter, FnProducer, Producer, RunStats};
pub use error::{AggregateError, ConfigError, UsageError};
pub use record::Record;
pub use render::{render, render_with, LineOrder, RenderOptions};
pub use tree::{Line, TreeNode};
