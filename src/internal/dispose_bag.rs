//! Internal disposal bag for tracked instances.

use std::fmt;
use std::sync::Arc;

use crate::traits::Dispose;

/// A tracked instance's disposal capability plus the type name used in
/// failure reports.
#[derive(Clone)]
pub(crate) struct Disposer {
    name: &'static str,
    target: Arc<dyn Dispose>,
}

impl Disposer {
    pub(crate) fn new(name: &'static str, target: Arc<dyn Dispose>) -> Self {
        Self { name, target }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer").field("name", &self.name).finish()
    }
}

/// Disposers in creation order, run LIFO.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposer>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposer: Disposer) {
        self.entries.push(disposer);
    }

    pub(crate) fn take(&mut self) -> DisposeBag {
        std::mem::take(self)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Disposes every entry in reverse order. A failure never stops the
    /// remaining disposals; each one is rendered into the returned list.
    pub(crate) fn dispose_reverse(mut self) -> Vec<String> {
        let mut failures = Vec::new();
        while let Some(disposer) = self.entries.pop() {
            if let Err(err) = disposer.target.dispose() {
                failures.push(format!("{}: {:#}", disposer.name, err));
            }
        }
        failures
    }
}
