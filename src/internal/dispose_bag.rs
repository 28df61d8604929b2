//! Internal disposal bag for managing cleanup hooks.

/// Disposal hook
pub(crate) type Disposer = Box<dyn FnOnce() + Send>;

/// Cleanup hooks owned by one scope, run in LIFO order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<Disposer>,
}

impl DisposeBag {
    /// Add a disposal hook.
    pub(crate) fn push(&mut self, f: Disposer) {
        self.hooks.push(f);
    }

    /// Removes every hook, leaving the bag empty, so they can be run without
    /// holding the owner's lock.
    pub(crate) fn take(&mut self) -> DisposeBag {
        std::mem::take(self)
    }

    /// Execute all hooks in reverse order (LIFO).
    pub(crate) fn run_reverse(mut self) -> usize {
        let count = self.hooks.len();
        while let Some(f) = self.hooks.pop() {
            (f)();
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}
