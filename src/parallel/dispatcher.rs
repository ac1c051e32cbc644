use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use super::cursor::{RetireGate, TakeCursor};
use super::estimate::{self, MAX_THREADS, MEMORY_PER_THREAD_MB};
use super::session::{Session, SessionSettings};

/// Fatal conditions that stop a dispatch from running to completion.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The operating system refused to start a worker thread.
    #[error("failed to start worker thread {thread}: {source}")]
    Spawn {
        thread: usize,
        #[source]
        source: std::io::Error,
    },
}

/// How a single worker thread finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadResult {
    Success,
    Failure,
}

/// Aggregate result of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Summary of one [`Dispatcher::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Number of work items dispatched.
    pub items: usize,
    /// Number of worker threads started.
    pub threads: usize,
    /// Threads that reported at least one failed item or cursor fault.
    pub failed_threads: usize,
    /// Threads that could not be joined cleanly.
    pub join_failures: usize,
}

impl DispatchReport {
    pub fn outcome(&self) -> Outcome {
        if self.failed_threads == 0 && self.join_failures == 0 {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Outcome::Success
    }
}

/// Shared state of one dispatch call. Lives on the dispatching thread's stack
/// and is borrowed by every worker.
struct DispatchState<W> {
    take: TakeCursor,
    retire: RetireGate<W>,
    settings: SessionSettings,
}

/// Runs indexed work items on a bounded pool of threads and writes their
/// output to a sink in index order.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    requested_threads: usize,
    max_threads: usize,
    memory_per_thread_mb: u64,
    settings: SessionSettings,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            requested_threads: 0,
            max_threads: MAX_THREADS,
            memory_per_thread_mb: MEMORY_PER_THREAD_MB,
            settings: SessionSettings::default(),
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested thread count, `0` selects one automatically.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.requested_threads = threads;
        self
    }

    /// Cap applied to the automatically selected thread count.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_memory_per_thread_mb(mut self, megabytes: u64) -> Self {
        self.memory_per_thread_mb = megabytes;
        self
    }

    /// Settings propagated into every [`Session`].
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Number of threads a dispatch of `items` items would start.
    pub fn thread_count(&self, items: usize) -> usize {
        estimate::effective_threads(items, self.requested_threads, self.max_threads, || {
            estimate::estimate_with_budget(self.memory_per_thread_mb)
        })
    }

    /// Run `work` once for every index in `0..items`.
    ///
    /// The work function must write its results only to the buffer it is
    /// given. Buffers are copied to `sink` strictly in index order, once
    /// every lower index has been written. A failing item does not stop the
    /// remaining items; it only turns the report into a failure.
    pub fn run<W, F>(&self, items: usize, sink: W, work: F) -> Result<DispatchReport, DispatchError>
    where
        W: Write + Send,
        F: Fn(&mut Session, usize, &mut dyn Write) -> anyhow::Result<()> + Sync,
    {
        if items == 0 {
            return Ok(DispatchReport::default());
        }

        let threads = self.thread_count(items);
        progress!(self.settings.verbose, "creating {threads} threads for {items} items");

        let state = DispatchState {
            take: TakeCursor::new(items),
            retire: RetireGate::new(sink),
            settings: self.settings,
        };
        let state = &state;
        let work = &work;

        let mut report = DispatchReport {
            items,
            threads,
            ..DispatchReport::default()
        };

        let started = crossbeam::thread::scope(|s| {
            let mut handles = Vec::with_capacity(threads);
            let mut spawn_error = None;

            for thread_number in 0..threads {
                let spawned = s
                    .builder()
                    .name(format!("orderly-worker-{thread_number}"))
                    .spawn(move |_| worker_loop(thread_number, state, work));

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        tracing::error!("failed to start worker thread {thread_number}: {source}");
                        spawn_error = Some(DispatchError::Spawn {
                            thread: thread_number,
                            source,
                        });
                        break;
                    }
                }
            }

            for (thread_number, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(ThreadResult::Success) => {}
                    Ok(ThreadResult::Failure) => report.failed_threads += 1,
                    Err(_) => {
                        tracing::error!("worker thread {thread_number} could not be joined");
                        report.join_failures += 1;
                    }
                }
            }

            spawn_error.map_or(Ok(()), Err)
        })
        // Every handle is joined above, so the scope has no unjoined panics to report.
        .unwrap_or_else(|panics| panic::resume_unwind(panics));
        started?;

        if report.is_success() {
            progress!(self.settings.verbose, "dispatched {items} items on {threads} threads");
        } else {
            tracing::warn!(
                "dispatch finished with {} failed threads and {} join failures",
                report.failed_threads,
                report.join_failures
            );
        }

        Ok(report)
    }
}

fn worker_loop<W, F>(thread_number: usize, state: &DispatchState<W>, work: &F) -> ThreadResult
where
    W: Write,
    F: Fn(&mut Session, usize, &mut dyn Write) -> anyhow::Result<()>,
{
    let verbose = state.settings.verbose;
    let mut result = ThreadResult::Success;

    progress!(verbose, "thread {thread_number}: starting");

    loop {
        let claim = state.take.claim();
        if let Some(fault) = claim.fault {
            tracing::error!("thread {thread_number}: {fault}");
            result = ThreadResult::Failure;
        }
        let Some(index) = claim.index else {
            break;
        };

        progress!(verbose, "thread {thread_number}: taking item {index}");

        let mut output = Vec::new();
        let mut session = Session::open(thread_number, index, state.settings);
        let span = session.span().clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            span.in_scope(|| work(&mut session, index, &mut output))
        }));
        drop(session);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("thread {thread_number}: item {index} failed: {e:#}");
                result = ThreadResult::Failure;
            }
            Err(_) => {
                tracing::error!("thread {thread_number}: item {index} panicked");
                result = ThreadResult::Failure;
            }
        }

        if let Err(fault) = state.retire.retire(thread_number, index, &output) {
            tracing::error!("thread {thread_number}: retiring item {index}: {fault}");
            result = ThreadResult::Failure;
        }
    }

    progress!(verbose, "thread {thread_number}: exiting ({result:?})");
    result
}
