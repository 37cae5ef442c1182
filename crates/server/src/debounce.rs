//! Selection debouncer.
//!
//! Cursor and selection movement arrives far faster than an agent needs it.
//! Each distinct snapshot re-arms a single-shot timer; when the window passes
//! with no further change the fire callback runs once and reads the editor
//! state fresh, so only the final selection is ever reported.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::editor::SelectionSnapshot;

pub struct SelectionDebouncer {
    delay: Duration,
    last: Option<SelectionSnapshot>,
    pending: Option<JoinHandle<()>>,
}

impl SelectionDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: None,
            pending: None,
        }
    }

    /// Feed one selection signal. Returns `false` when the snapshot equals
    /// the last one seen and nothing was (re)armed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn signal<F>(&mut self, snapshot: SelectionSnapshot, fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.last.as_ref() == Some(&snapshot) {
            return false;
        }
        self.last = Some(snapshot);
        self.cancel();

        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
        true
    }

    /// Drop the pending timer, if any. Re-arming later works as usual.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for SelectionDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
