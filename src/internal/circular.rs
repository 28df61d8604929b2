//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 1024;

// Components currently being constructed on this thread, outermost first.
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Marks a component as under construction for as long as it lives.
pub(crate) struct StackGuard {
    name: &'static str,
}

impl StackGuard {
    /// Pushes `name`, failing if it is already being constructed on this
    /// thread or the chain is too deep.
    pub(crate) fn enter(name: &'static str) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.iter().any(|&n| n == name) {
                let mut path = stack.clone();
                path.push(name);
                return Err(DiError::Circular(path));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(name);
            Ok(Self { name })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.name));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentering_reports_full_path() {
        let _a = StackGuard::enter("A").unwrap();
        let _b = StackGuard::enter("B").unwrap();
        match StackGuard::enter("A") {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["A", "B", "A"]),
            _ => panic!("expected circular error"),
        }
    }

    #[test]
    fn guard_pops_on_drop() {
        {
            let _a = StackGuard::enter("Solo").unwrap();
        }
        assert!(StackGuard::enter("Solo").is_ok());
    }
}
