//! Completion callbacks returned by "before" hooks.

use std::fmt;

/// A zero-argument callback fired once the observed operation has finished.
///
/// A `Completion` fires exactly once: either through [`complete`](Self::complete)
/// or, if it is dropped first, from its destructor. Dropping covers the case
/// where the future driving the operation is cancelled before it resolves.
#[must_use = "a completion fires when dropped; hold it until the operation finishes"]
pub struct Completion(Option<Box<dyn FnOnce() + Send>>);

impl Completion {
    /// A completion that does nothing.
    pub const fn noop() -> Self {
        Self(None)
    }

    /// Wrap a callback.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Combine several completions into one that fires them in order.
    pub fn all(completions: Vec<Completion>) -> Self {
        let mut live: Vec<Completion> = completions
            .into_iter()
            .filter(|c| !c.is_noop())
            .collect();
        match live.len() {
            0 => Self::noop(),
            1 => live.remove(0),
            _ => Self::new(move || {
                for completion in live {
                    completion.complete();
                }
            }),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.0.is_none()
    }

    /// Fire the callback now.
    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::noop()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("noop", &self.is_noop())
            .finish()
    }
}
