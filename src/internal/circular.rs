//! Circular dependency detection for ad-hoc resolution.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

// Producers currently being resolved on this thread, outermost first
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(u64, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the thread-local resolution stack.
///
/// Entering a producer that is already on the stack fails with
/// [`DiError::Cyclic`] carrying the path from the first occurrence back to
/// itself, so a cycle is reported before any exactly-once cell is re-entered.
pub(crate) struct StackGuard {
    id: u64,
}

impl StackGuard {
    pub(crate) fn enter(id: u64, name: &'static str, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(start) = stack.iter().position(|(frame, _)| *frame == id) {
                let mut path: Vec<&'static str> = stack[start..].iter().map(|(_, n)| *n).collect();
                path.push(name);
                return Err(DiError::Cyclic(path));
            }

            if stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(max_depth));
            }

            stack.push((id, name));
            Ok(Self { id })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped.map(|(id, _)| id), Some(self.id));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentering_a_frame_reports_the_cycle_path() {
        let _a = StackGuard::enter(1, "A", 16).unwrap();
        let _b = StackGuard::enter(2, "B", 16).unwrap();
        match StackGuard::enter(1, "A", 16) {
            Err(DiError::Cyclic(path)) => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn frames_are_released_on_drop() {
        {
            let _a = StackGuard::enter(7, "A", 16).unwrap();
        }
        assert!(StackGuard::enter(7, "A", 16).is_ok());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let _a = StackGuard::enter(10, "A", 2).unwrap();
        let _b = StackGuard::enter(11, "B", 2).unwrap();
        assert!(matches!(StackGuard::enter(12, "C", 2), Err(DiError::DepthExceeded(2))));
    }
}
