//! Ordered parallel execution
//!
//! This module runs a fixed pool of worker threads over `N` indexed work items
//! and writes the output of every item to a single sink **in index order**,
//! even though items finish in whatever order the threads happen to run them.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  TakeCursor  │  next index to hand out (mutex)
//!                 └──────┬───────┘
//!          claim i       │       claim j
//!        ┌───────────────┼───────────────┐
//!        ▼               ▼               ▼
//!   ┌─────────┐     ┌─────────┐     ┌─────────┐
//!   │ worker 0│     │ worker 1│     │ worker 2│   Session + private buffer
//!   └────┬────┘     └────┬────┘     └────┬────┘   per item
//!        │ wait turn     │               │
//!        ▼               ▼               ▼
//!                 ┌──────────────┐
//!                 │  RetireGate  │  next index to flush (mutex + condvar)
//!                 └──────┬───────┘
//!                        ▼
//!                      sink
//! ```
//!
//! - Claim order is unordered: any idle worker takes the next index.
//! - Retire order is strictly increasing: a worker holding item `i` waits
//!   until every lower index has been flushed.
//! - A failing item is recorded and retired like any other, the remaining
//!   items still run.
//!
//! # Example
//!
//! ```rust
//! use orderly::parallel::Dispatcher;
//! use std::io::Write;
//!
//! let mut out = Vec::new();
//! let report = Dispatcher::new()
//!     .with_threads(4)
//!     .run(3, &mut out, |_session, i, buf| {
//!         writeln!(buf, "item {i}")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert!(report.is_success());
//! assert_eq!(out, b"item 0\nitem 1\nitem 2\n");
//! ```

/// Log at `info` when verbose, `debug` otherwise.
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod cursor;
pub mod dispatcher;
pub mod estimate;
pub mod session;

// Re-export main types for easier access
pub use dispatcher::{DispatchError, DispatchReport, Dispatcher, Outcome, ThreadResult};
pub use estimate::{MAX_THREADS, MEMORY_PER_THREAD_MB, estimate_max_threads};
pub use session::{Session, SessionSettings};
