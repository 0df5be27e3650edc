//! Command line front end for batch document processing
//!
//! Loads files from disk into a session, runs one mode over them and writes
//! the artifact. Image resizing runs on a worker thread.

pub mod batch;
pub mod cli;
pub mod output;
pub mod worker;

pub use batch::{process, BatchRequest, BatchResult};
pub use cli::Args;
