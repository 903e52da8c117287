//! The runtime loop: event bus → fold → state, and state + event → triggers → event bus.
//!
//! Two tasks run for the lifetime of the bus:
//!
//! 1. **Fold**: subscribes to the bus and applies the root reducer as a running left-fold
//!    seeded with the initial state. Every result is published on a replay-latest state
//!    channel.
//! 2. **Feedback**: subscribes to the bus and, for every event, takes the *current* state
//!    snapshot, runs the combined triggers against the `modules` slice, and republishes every
//!    follow-up event.
//!
//! The two tasks are not synchronized. The snapshot the feedback task reads may not include
//! the event it is reacting to yet, so trigger decisions are eventually consistent with state.

use crate::HealthStatus;
use crate::builtins::{self, MODULES_KEY};
use crate::error::RuntimeError;
use crate::metrics::RuntimeMetrics;
use futures::{Stream, StreamExt};
use pulse_core::reducer::Reducer;
use pulse_core::registry::RegistryOutcome;
use pulse_core::state::{self, State};
use pulse_core::trigger::Trigger;
use pulse_core::{Event, EventBus, EventStream, Module, ReducerRegistry, TriggerRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Read access to the latest folded state.
///
/// Cheap to clone; every clone observes the same state channel.
#[derive(Clone)]
pub struct StateHandle {
    receiver: watch::Receiver<Arc<State>>,
}

impl StateHandle {
    /// The most recent fold result.
    #[must_use]
    pub fn snapshot(&self) -> Arc<State> {
        self.receiver.borrow().clone()
    }

    /// Replay-latest stream of states: the current snapshot, then every later fold result.
    ///
    /// Intermediate states may be skipped if the consumer is slower than the fold.
    pub fn stream(&self) -> impl Stream<Item = Arc<State>> + Send + 'static {
        let mut receiver = self.receiver.clone();
        async_stream::stream! {
            let current = receiver.borrow_and_update().clone();
            yield current;
            while receiver.changed().await.is_ok() {
                let next = receiver.borrow_and_update().clone();
                yield next;
            }
        }
    }

    /// Wait until the state satisfies `predicate`, returning that snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Stopped`] if the runtime is dropped first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Arc<State>, RuntimeError>
    where
        F: FnMut(&State) -> bool,
    {
        let mut receiver = self.receiver.clone();
        let snapshot = receiver
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| RuntimeError::Stopped)?
            .clone();
        Ok(snapshot)
    }
}

/// The reactive runtime: registries, state, and the fold/feedback tasks.
///
/// # Example
///
/// ```ignore
/// let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::default());
/// let runtime = Runtime::new(bus);
///
/// runtime.register("prices", prices_module());
/// runtime.start()?;
///
/// let state = runtime.state();
/// println!("{}", state["modules"]["prices"]);
/// ```
pub struct Runtime {
    bus: Arc<dyn EventBus>,
    reducers: Arc<Mutex<ReducerRegistry>>,
    triggers: Arc<RwLock<TriggerRegistry>>,
    state: Arc<watch::Sender<Arc<State>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Runtime {
    /// Create a runtime over `bus` seeded with the built-in initial state.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self::with_initial_state(bus, builtins::initial_state())
    }

    /// Create a runtime over `bus` seeded with an explicit initial state.
    #[must_use]
    pub fn with_initial_state(bus: Arc<dyn EventBus>, initial_state: State) -> Self {
        let (state, _) = watch::channel(Arc::new(initial_state));
        Self {
            bus,
            reducers: Arc::new(Mutex::new(ReducerRegistry::new())),
            triggers: Arc::new(RwLock::new(TriggerRegistry::new())),
            state: Arc::new(state),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// The bus this runtime folds.
    #[must_use]
    pub fn bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.bus)
    }

    /// Register a module's reducer and trigger under `key`.
    ///
    /// Re-registering an existing key is a no-op.
    pub fn register(&self, key: &str, module: Module) -> RegistryOutcome {
        let reducer = self.register_reducer(key, module.reducer);
        let trigger = self.register_trigger(key, module.trigger);

        if reducer == RegistryOutcome::Added || trigger == RegistryOutcome::Added {
            RegistryOutcome::Added
        } else {
            RegistryOutcome::Ignored
        }
    }

    /// Unregister a module's reducer and trigger.
    ///
    /// The module's state slice is deleted on the next fold. Unknown keys are a no-op.
    pub fn unregister(&self, key: &str) -> RegistryOutcome {
        let reducer = self.unregister_reducer(key);
        let trigger = self.unregister_trigger(key);

        if reducer == RegistryOutcome::Removed || trigger == RegistryOutcome::Removed {
            RegistryOutcome::Removed
        } else {
            RegistryOutcome::Ignored
        }
    }

    /// Register a reducer for the `modules.<key>` slice.
    pub fn register_reducer(&self, key: &str, reducer: Arc<dyn Reducer>) -> RegistryOutcome {
        let outcome = lock(&self.reducers).add(key, reducer);
        tracing::debug!(key, ?outcome, "Register reducer");
        outcome
    }

    /// Register a trigger that sees the `modules.<key>` slice.
    pub fn register_trigger(&self, key: &str, trigger: Arc<dyn Trigger>) -> RegistryOutcome {
        let outcome = self
            .triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(key, trigger);
        tracing::debug!(key, ?outcome, "Register trigger");
        outcome
    }

    /// Unregister the reducer for `key`; its slice is purged on the next fold.
    pub fn unregister_reducer(&self, key: &str) -> RegistryOutcome {
        let outcome = lock(&self.reducers).remove(key);
        tracing::debug!(key, ?outcome, "Unregister reducer");
        outcome
    }

    /// Unregister the trigger for `key`.
    pub fn unregister_trigger(&self, key: &str) -> RegistryOutcome {
        let outcome = self
            .triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        tracing::debug!(key, ?outcome, "Unregister trigger");
        outcome
    }

    /// Start the fold and feedback tasks and publish the `start` event.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyStarted`] on a second call and
    /// [`RuntimeError::Bus`] if the bus is already closed.
    #[tracing::instrument(skip_all, name = "runtime_start")]
    pub fn start(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted);
        }

        // Both subscriptions exist before `start` is published so neither can miss it.
        let fold_events = self.bus.subscribe()?;
        let feedback_events = self.bus.subscribe()?;

        let fold = tokio::spawn(run_fold(
            fold_events,
            Arc::clone(&self.reducers),
            Arc::clone(&self.state),
        ));
        let feedback = tokio::spawn(run_feedback(
            feedback_events,
            Arc::clone(&self.triggers),
            self.state.subscribe(),
            Arc::clone(&self.bus),
        ));
        lock(&self.tasks).extend([fold, feedback]);

        self.bus.publish(Event::start())?;
        tracing::info!("Runtime started");
        Ok(())
    }

    /// Publish an event onto the bus.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Bus`] if the bus is closed.
    pub fn publish(&self, event: Event) -> Result<(), RuntimeError> {
        self.bus.publish(event)?;
        Ok(())
    }

    /// The most recent fold result.
    #[must_use]
    pub fn state(&self) -> Arc<State> {
        self.state.borrow().clone()
    }

    /// A handle for reading state from other tasks.
    #[must_use]
    pub fn state_handle(&self) -> StateHandle {
        StateHandle {
            receiver: self.state.subscribe(),
        }
    }

    /// Coarse liveness derived from the bus and lifecycle.
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        if self.bus.is_closed() {
            HealthStatus::Unhealthy
        } else if self.started.load(Ordering::Acquire) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Close the bus and wait for the fold and feedback tasks to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskJoinError`] if a task panicked (a reducer or trigger
    /// defect).
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        tracing::info!("Shutting down runtime");
        self.bus.close();

        let tasks: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for task in tasks {
            task.await?;
        }

        tracing::info!("Runtime stopped");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_fold(
    mut events: EventStream,
    reducers: Arc<Mutex<ReducerRegistry>>,
    state: Arc<watch::Sender<Arc<State>>>,
) {
    while let Some(event) = events.next().await {
        let current = state.borrow().clone();

        let started = std::time::Instant::now();
        let next = {
            let mut registry = lock(&reducers);
            builtins::reduce_root((*current).clone(), &event, &mut registry)
        };
        RuntimeMetrics::record_fold(started.elapsed());

        tracing::trace!(event_type = event.event_type(), "Folded event");
        state.send_replace(Arc::new(next));
    }

    tracing::debug!("Fold task finished: event bus closed");
}

async fn run_feedback(
    mut events: EventStream,
    triggers: Arc<RwLock<TriggerRegistry>>,
    state: watch::Receiver<Arc<State>>,
    bus: Arc<dyn EventBus>,
) {
    while let Some(event) = events.next().await {
        // Latest known state, which may not include `event` yet.
        let snapshot = state.borrow().clone();
        let modules = state::slice(&snapshot, MODULES_KEY).into_owned();
        let combined = triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .combined();

        let mut follow_ups = combined.fire(&modules, &event);
        while let Some(follow_up) = follow_ups.next().await {
            tracing::debug!(
                cause = event.event_type(),
                event_type = follow_up.event_type(),
                "Trigger produced event"
            );
            if bus.publish(follow_up).is_err() {
                tracing::debug!("Feedback task finished: event bus closed");
                return;
            }
            RuntimeMetrics::record_triggered();
        }
    }

    tracing::debug!("Feedback task finished: event bus closed");
}
