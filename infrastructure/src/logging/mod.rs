//! Structured activity logging.
//!
//! Provides [`JsonlActivityLogger`], a JSONL file writer that implements
//! the [`ActivityLogger`](blockhand_application::ActivityLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlActivityLogger;
