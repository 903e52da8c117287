//! Modules: a reducer/trigger pair registered under a unique key.

use crate::reducer::Reducer;
use crate::trigger::{NoTrigger, Trigger};
use std::sync::Arc;

/// The unit external collaborators register with the runtime.
///
/// The reducer owns the state slice under the module's key; the trigger sees that same slice
/// and may emit follow-up events (for example `HTTP_POLLING_STARTED` to begin polling).
#[derive(Clone)]
pub struct Module {
    /// Folds events into the module's slice
    pub reducer: Arc<dyn Reducer>,
    /// Derives follow-up events from the module's slice
    pub trigger: Arc<dyn Trigger>,
}

impl Module {
    /// Create a module from any reducer and trigger.
    #[must_use]
    pub fn new(reducer: impl Reducer + 'static, trigger: impl Trigger + 'static) -> Self {
        Self {
            reducer: Arc::new(reducer),
            trigger: Arc::new(trigger),
        }
    }

    /// A module that only derives state.
    #[must_use]
    pub fn reducer_only(reducer: impl Reducer + 'static) -> Self {
        Self::new(reducer, NoTrigger)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module").finish_non_exhaustive()
    }
}
