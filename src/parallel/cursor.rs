use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};

/// A synchronization problem observed while holding one of the cursors.
///
/// The cursor operation still completed; the worker reports the fault so the
/// thread is counted as failed.
#[derive(Debug)]
pub(crate) enum CursorFault {
    /// The mutex was poisoned by a panic on another thread.
    Poisoned(&'static str),
    /// Writing the retired output to the sink failed.
    Sink(io::Error),
    /// The sink panicked while being written to.
    SinkPanicked,
}

impl std::fmt::Display for CursorFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorFault::Poisoned(which) => write!(f, "{which} lock was poisoned"),
            CursorFault::Sink(e) => write!(f, "failed to write output: {e}"),
            CursorFault::SinkPanicked => write!(f, "output sink panicked"),
        }
    }
}

/// Lock `mutex`, recovering the guard if it was poisoned.
///
/// Poison is cleared after it has been reported once so that a single panic
/// does not fail every later lock attempt.
fn lock_recovering<'a, T>(
    mutex: &'a Mutex<T>,
    which: &'static str,
) -> (MutexGuard<'a, T>, Option<CursorFault>) {
    match mutex.lock() {
        Ok(guard) => (guard, None),
        Err(poisoned) => {
            tracing::error!("{which} lock poisoned, recovering");
            let guard = poisoned.into_inner();
            mutex.clear_poison();
            (guard, Some(CursorFault::Poisoned(which)))
        }
    }
}

/// Outcome of one claim attempt on the [`TakeCursor`].
#[derive(Debug)]
pub(crate) struct Claim {
    pub index: Option<usize>,
    pub fault: Option<CursorFault>,
}

/// Hands out item indices in increasing order. Each index below `limit` is
/// given to exactly one caller.
pub(crate) struct TakeCursor {
    next: Mutex<usize>,
    limit: usize,
}

impl TakeCursor {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            next: Mutex::new(0),
            limit,
        }
    }

    pub(crate) fn claim(&self) -> Claim {
        let (mut next, fault) = lock_recovering(&self.next, "take");
        let index = if *next < self.limit {
            let index = *next;
            *next += 1;
            Some(index)
        } else {
            None
        };
        Claim { index, fault }
    }
}

struct RetireState<W> {
    next: usize,
    sink: W,
}

/// Turnstile that lets buffered item output reach the sink strictly in index
/// order.
///
/// The sink lives under the same mutex as the retire counter, so only the
/// worker whose turn it is can write to it.
pub(crate) struct RetireGate<W> {
    state: Mutex<RetireState<W>>,
    turn: Condvar,
}

impl<W: Write> RetireGate<W> {
    pub(crate) fn new(sink: W) -> Self {
        Self {
            state: Mutex::new(RetireState { next: 0, sink }),
            turn: Condvar::new(),
        }
    }

    /// Block until `index` is next in line, write `output` to the sink and
    /// advance the counter to `index + 1`.
    ///
    /// The counter is advanced even when the write fails, otherwise every
    /// higher index would wait forever.
    pub(crate) fn retire(
        &self,
        thread_number: usize,
        index: usize,
        output: &[u8],
    ) -> Result<(), CursorFault> {
        let (mut state, mut fault) = lock_recovering(&self.state, "retire");

        tracing::trace!(
            "thread {thread_number}: waiting to retire item {index} (next to retire {})",
            state.next
        );

        while state.next != index {
            state = match self.turn.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => {
                    tracing::error!("retire lock poisoned while waiting, recovering");
                    self.state.clear_poison();
                    fault.get_or_insert(CursorFault::Poisoned("retire"));
                    poisoned.into_inner()
                }
            };
        }

        tracing::trace!("thread {thread_number}: retiring item {index}");

        let sink = &mut state.sink;
        let written = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.write_all(output)?;
            sink.flush()
        }));
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                fault.get_or_insert(CursorFault::Sink(e));
            }
            Err(_) => {
                fault.get_or_insert(CursorFault::SinkPanicked);
            }
        }

        state.next = index + 1;
        self.turn.notify_all();
        drop(state);

        fault.map_or(Ok(()), Err)
    }

    /// Index of the next item allowed to retire.
    #[cfg(test)]
    pub(crate) fn next_to_retire(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_take_cursor_exhausts() {
        let cursor = TakeCursor::new(3);
        let claimed: Vec<_> = (0..5).map(|_| cursor.claim().index).collect();
        assert_eq!(claimed, vec![Some(0), Some(1), Some(2), None, None]);
    }

    #[test]
    fn test_take_cursor_empty() {
        let cursor = TakeCursor::new(0);
        assert!(cursor.claim().index.is_none());
    }

    #[test]
    fn test_retire_waits_for_turn() {
        let gate = Arc::new(RetireGate::new(Vec::new()));

        let late = {
            let gate = gate.clone();
            thread::spawn(move || gate.retire(1, 1, b"second\n"))
        };

        // Item 1 cannot retire before item 0.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(gate.next_to_retire(), 0);

        gate.retire(0, 0, b"first\n").unwrap();
        late.join().unwrap().unwrap();

        assert_eq!(gate.next_to_retire(), 2);
        let gate = Arc::into_inner(gate).unwrap();
        let sink = gate.state.into_inner().unwrap().sink;
        assert_eq!(sink, b"first\nsecond\n");
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_retire_advances_on_sink_error() {
        let gate = RetireGate::new(BrokenSink);
        let result = gate.retire(0, 0, b"lost");
        assert!(matches!(result, Err(CursorFault::Sink(_))));
        assert_eq!(gate.next_to_retire(), 1);
    }

    fn poison<T: Send>(mutex: &Mutex<T>) {
        thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = mutex.lock();
                    panic!("poisoning the lock");
                })
                .join();
        });
    }

    #[test]
    fn test_lock_recovering_clears_poison() {
        let mutex = Mutex::new(5);
        poison(&mutex);
        assert!(mutex.is_poisoned());

        let (guard, fault) = lock_recovering(&mutex, "take");
        assert_eq!(*guard, 5);
        assert!(matches!(fault, Some(CursorFault::Poisoned("take"))));
        drop(guard);

        assert!(!mutex.is_poisoned());
        let (_guard, fault) = lock_recovering(&mutex, "take");
        assert!(fault.is_none());
    }

    #[test]
    fn test_take_cursor_recovers_from_poison() {
        let cursor = TakeCursor::new(2);
        poison(&cursor.next);

        let claim = cursor.claim();
        assert_eq!(claim.index, Some(0));
        assert!(matches!(claim.fault, Some(CursorFault::Poisoned("take"))));

        let claim = cursor.claim();
        assert_eq!(claim.index, Some(1));
        assert!(claim.fault.is_none());
    }

    #[test]
    fn test_retire_recovers_from_poison() {
        let gate = RetireGate::new(Vec::new());
        poison(&gate.state);

        let result = gate.retire(0, 0, b"kept\n");
        assert!(matches!(result, Err(CursorFault::Poisoned("retire"))));
        assert_eq!(gate.next_to_retire(), 1);

        gate.retire(0, 1, b"next\n").unwrap();
        let sink = gate.state.into_inner().unwrap().sink;
        assert_eq!(sink, b"kept\nnext\n");
    }

    struct PanickingSink;

    impl Write for PanickingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            panic!("sink exploded");
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_retire_advances_on_sink_panic() {
        let gate = RetireGate::new(PanickingSink);
        let result = gate.retire(0, 0, b"lost");
        assert!(matches!(result, Err(CursorFault::SinkPanicked)));
        assert_eq!(gate.next_to_retire(), 1);
        assert!(!gate.state.is_poisoned());
    }
}
