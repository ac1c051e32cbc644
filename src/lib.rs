//! # Orderly - ordered parallel execution
//!
//! Orderly runs independent work items on a bounded pool of threads and writes
//! each item's output in the original input order, however the items happen to
//! finish.
//!
//! ## Features
//!
//! - **Ordered output**: per-item buffers are retired strictly by index
//! - **Bounded pool**: thread count chosen from available memory,
//!   capped at [`parallel::MAX_THREADS`] unless set explicitly
//! - **Isolated sessions**: every item gets a fresh [`parallel::Session`]
//! - **Keeps going**: failed items are reported without stopping the batch
//!
//! ## Quick Start
//!
//! ```bash
//! # Print line counts for every file, in the order given
//! ls *.log | orderly run -P 4 -- wc -l {}
//! ```

pub mod cli;
pub mod config;
pub mod parallel;
pub mod runner;
pub mod utils;

pub use cli::{Cli, Output};
pub use config::OrderlyConfig;
pub use parallel::{DispatchReport, Dispatcher};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
