use std::panic::{self, AssertUnwindSafe};

/// Settings copied from the caller into every [`Session`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub trace: bool,
    pub verbose: bool,
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Isolated per-item execution context.
///
/// A session is opened for exactly one item on one worker thread and is
/// dropped as soon as the work function returns, whether it succeeded or not.
/// Resources the work function acquires can be tied to the session with
/// [`Session::on_close`]; they are released in reverse registration order
/// when the session is dropped.
pub struct Session {
    identifier: String,
    thread_number: usize,
    item_index: usize,
    settings: SessionSettings,
    span: tracing::Span,
    close_hooks: Vec<CloseHook>,
}

impl Session {
    pub(crate) fn open(thread_number: usize, item_index: usize, settings: SessionSettings) -> Self {
        let identifier = format!("thread_{thread_number}_item_{item_index}");
        let span = tracing::debug_span!("session", id = %identifier);

        if settings.trace {
            span.in_scope(|| tracing::trace!("session opened"));
        }

        Self {
            identifier,
            thread_number,
            item_index,
            settings,
            span,
            close_hooks: Vec::new(),
        }
    }

    /// Unique label of this session, `thread_{thread}_item_{index}`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn thread_number(&self) -> usize {
        self.thread_number
    }

    pub fn item_index(&self) -> usize {
        self.item_index
    }

    pub fn trace(&self) -> bool {
        self.settings.trace
    }

    pub fn verbose(&self) -> bool {
        self.settings.verbose
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub(crate) fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Register cleanup to run when the session closes.
    pub fn on_close(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.close_hooks.push(Box::new(hook));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identifier", &self.identifier)
            .field("settings", &self.settings)
            .field("close_hooks", &self.close_hooks.len())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _entered = self.span.enter();

        while let Some(hook) = self.close_hooks.pop() {
            if panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
                tracing::error!("close hook panicked");
            }
        }

        if self.settings.trace {
            tracing::trace!("session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_session_identifier() {
        let session = Session::open(3, 41, SessionSettings::default());
        assert_eq!(session.identifier(), "thread_3_item_41");
        assert_eq!(session.thread_number(), 3);
        assert_eq!(session.item_index(), 41);
    }

    #[test]
    fn test_session_inherits_settings() {
        let settings = SessionSettings {
            trace: true,
            verbose: false,
        };
        let session = Session::open(0, 0, settings);
        assert!(session.trace());
        assert!(!session.verbose());
        assert_eq!(session.settings(), settings);
    }

    #[test]
    fn test_close_hooks_run_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut session = Session::open(0, 7, SessionSettings::default());
        for name in ["disk", "handle"] {
            let log = log.clone();
            session.on_close(move || log.lock().unwrap().push(name));
        }
        assert!(log.lock().unwrap().is_empty());

        drop(session);
        assert_eq!(*log.lock().unwrap(), vec!["handle", "disk"]);
    }

    #[test]
    fn test_panicking_close_hook_does_not_skip_others() {
        let ran = Arc::new(Mutex::new(false));

        let mut session = Session::open(1, 2, SessionSettings::default());
        {
            let ran = ran.clone();
            session.on_close(move || *ran.lock().unwrap() = true);
        }
        session.on_close(|| panic!("boom"));

        drop(session);
        assert!(*ran.lock().unwrap());
    }
}
