//! Default worker count heuristics.
//!
//! Each worker may hold a heavyweight per-item session, so the default thread
//! count is bounded by how many sessions fit in the memory that is currently
//! available.

/// Upper bound on automatically selected threads.
///
/// Backends with their own connection limits break down above roughly twenty
/// concurrent clients.
pub const MAX_THREADS: usize = 12;

/// Memory budget assumed for every worker when estimating, in MiB.
pub const MEMORY_PER_THREAD_MB: u64 = 650;

const MIB: u64 = 1024 * 1024;

/// Estimate a safe worker count using [`MEMORY_PER_THREAD_MB`].
pub fn estimate_max_threads() -> usize {
    estimate_with_budget(MEMORY_PER_THREAD_MB)
}

/// Estimate a safe worker count for a per-thread budget of `memory_per_thread_mb`.
///
/// Falls back to a single thread when available memory cannot be determined.
pub fn estimate_with_budget(memory_per_thread_mb: u64) -> usize {
    estimate_from(available_memory_bytes(), memory_per_thread_mb)
}

fn estimate_from(available_bytes: u64, memory_per_thread_mb: u64) -> usize {
    let Some(estimate) = threads_for_memory(available_bytes, memory_per_thread_mb) else {
        tracing::debug!("available memory unknown, using a single thread");
        return 1;
    };

    tracing::debug!(
        "estimated {} threads ({} MiB available, {} MiB per thread)",
        estimate.max(1),
        available_bytes / MIB,
        memory_per_thread_mb
    );

    estimate.max(1)
}

/// Pick the number of threads to run for `items` work items.
///
/// An explicit `requested` count (> 0) is honoured up to the item count.
/// Otherwise the estimate is capped at `max_threads`.
pub fn effective_threads(
    items: usize,
    requested: usize,
    max_threads: usize,
    estimate: impl FnOnce() -> usize,
) -> usize {
    if items == 0 {
        return 0;
    }
    if requested > 0 {
        return items.min(requested);
    }
    items.min(max_threads.max(1).min(estimate().max(1)))
}

fn threads_for_memory(available_bytes: u64, memory_per_thread_mb: u64) -> Option<usize> {
    if available_bytes == 0 || memory_per_thread_mb == 0 {
        return None;
    }
    usize::try_from(available_bytes / memory_per_thread_mb.saturating_mul(MIB)).ok()
}

fn available_memory_bytes() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.available_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_is_positive() {
        assert!(estimate_max_threads() >= 1);
        assert!(estimate_with_budget(u64::MAX / MIB) >= 1);
    }

    #[test]
    fn test_threads_for_memory() {
        assert_eq!(threads_for_memory(0, 650), None);
        assert_eq!(threads_for_memory(4 * 1024 * MIB, 0), None);
        assert_eq!(threads_for_memory(4 * 1024 * MIB, 650), Some(6));
        assert_eq!(threads_for_memory(100 * MIB, 650), Some(0));
    }

    #[test]
    fn test_unknown_memory_falls_back_to_one() {
        assert_eq!(estimate_from(0, 650), 1);
        assert_eq!(estimate_from(64 * 1024 * MIB, 0), 1);
        assert_eq!(estimate_with_budget(0), 1);
    }

    #[test]
    fn test_estimate_from_memory() {
        assert_eq!(estimate_from(4 * 1024 * MIB, 650), 6);
        // Less than one budget's worth of memory still yields a thread.
        assert_eq!(estimate_from(100 * MIB, 650), 1);
    }

    #[test]
    fn test_effective_threads_explicit() {
        assert_eq!(effective_threads(100, 4, MAX_THREADS, || 1), 4);
        assert_eq!(effective_threads(3, 40, MAX_THREADS, || 1), 3);
        // Explicit requests may exceed the automatic cap.
        assert_eq!(effective_threads(100, 20, MAX_THREADS, || 1), 20);
    }

    #[test]
    fn test_effective_threads_auto() {
        assert_eq!(effective_threads(100, 0, MAX_THREADS, || 64), MAX_THREADS);
        assert_eq!(effective_threads(100, 0, MAX_THREADS, || 5), 5);
        assert_eq!(effective_threads(2, 0, MAX_THREADS, || 64), 2);
        assert_eq!(effective_threads(100, 0, MAX_THREADS, || 0), 1);
    }

    #[test]
    fn test_effective_threads_no_items() {
        let mut called = false;
        assert_eq!(
            effective_threads(0, 0, MAX_THREADS, || {
                called = true;
                8
            }),
            0
        );
        assert!(!called);
    }
}
