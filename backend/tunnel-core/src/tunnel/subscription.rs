use std::fmt;

/// Cancellation token for a status observer registration.
///
/// The registration is removed on [`invalidate`](Self::invalidate) or drop,
/// whichever comes first.
pub struct StatusSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the registration. Safe to call more than once.
    pub fn invalidate(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}
