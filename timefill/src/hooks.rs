//! Synchronous callbacks at fixed points of a run.

use crate::driver::BrowserDriver;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Login submitted and the landing page settled
    AfterLogin,
    /// Everything filled, draft save about to be triggered
    BeforeSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

pub type HookFn = Box<dyn FnMut(&dyn BrowserDriver) + Send>;

struct Registration {
    id: HookId,
    point: HookPoint,
    name: String,
    callback: HookFn,
}

/// Ordered callbacks per [`HookPoint`]. Hooks cannot cancel the run.
#[derive(Default)]
pub struct HookRegistry {
    next_id: u64,
    hooks: Vec<Registration>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| (h.point, &h.name)))
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, point: HookPoint, name: impl Into<String>, callback: F) -> HookId
    where
        F: FnMut(&dyn BrowserDriver) + Send + 'static,
    {
        self.next_id += 1;
        let id = HookId(self.next_id);
        self.hooks.push(Registration {
            id,
            point,
            name: name.into(),
            callback: Box::new(callback),
        });
        id
    }

    /// Returns `false` when the id was never registered or already removed
    pub fn unregister(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.id != id);
        self.hooks.len() != before
    }

    pub fn len(&self, point: HookPoint) -> usize {
        self.hooks.iter().filter(|h| h.point == point).count()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the hooks for `point` in registration order
    pub fn emit(&mut self, point: HookPoint, driver: &dyn BrowserDriver) {
        for hook in self.hooks.iter_mut().filter(|h| h.point == point) {
            debug!(?point, hook = %hook.name, "Running hook");
            (hook.callback)(driver);
        }
    }
}
