//! Ergonomic testing utilities for modules
//!
//! This module provides a fluent API for testing a module's reducer and trigger together with
//! readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ModuleTest is the natural name

use pulse_core::trigger::Triggered;
use pulse_core::{Event, Module, State};

/// Type alias for state assertion functions
type StateAssertion = Box<dyn FnOnce(&State)>;

/// Type alias for triggered-event assertion functions
type EventAssertion = Box<dyn FnOnce(&[Event])>;

/// Fluent API for testing modules with Given-When-Then syntax
///
/// The reducer and the trigger both see the *given* state, matching what the runtime's
/// feedback loop observes when it wins the race against the fold.
///
/// # Example
///
/// ```
/// use pulse_core::trigger::Triggered;
/// use pulse_core::{Event, Module, State, smallvec};
/// use pulse_testing::{ModuleTest, assertions};
/// use serde_json::json;
///
/// let module = Module::new(
///     |s: State, e: &Event| if e.is("tick") { json!(s.as_u64().unwrap_or(0) + 1) } else { s },
///     |_s: &State, _e: &Event| -> Triggered { smallvec![] },
/// );
///
/// ModuleTest::new(module)
///     .given_state(json!(1))
///     .when_event(Event::new("tick"))
///     .then_state(|state| assert_eq!(state, &json!(2)))
///     .then_events(assertions::assert_no_events)
///     .run();
/// ```
pub struct ModuleTest {
    module: Module,
    initial_state: Option<State>,
    event: Option<Event>,
    state_assertions: Vec<StateAssertion>,
    event_assertions: Vec<EventAssertion>,
}

impl ModuleTest {
    /// Create a new module test
    #[must_use]
    pub const fn new(module: Module) -> Self {
        Self {
            module,
            initial_state: None,
            event: None,
            state_assertions: Vec::new(),
            event_assertions: Vec::new(),
        }
    }

    /// Set the module's slice before the event (Given)
    #[must_use]
    pub fn given_state(mut self, state: State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the event to test (When)
    #[must_use]
    pub fn when_event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    /// Add an assertion about the resulting slice (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the triggered events (Then)
    #[must_use]
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Event]) + 'static,
    {
        self.event_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// An unset initial state defaults to an empty object, like an unregistered slice.
    ///
    /// # Panics
    ///
    /// Panics if the event is not set, or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let state = self
            .initial_state
            .unwrap_or_else(pulse_core::state::empty);
        let event = self.event.expect("Event must be set with when_event()");

        let triggered: Triggered = self.module.trigger.trigger(&state, &event);
        let next = self.module.reducer.reduce(state, &event);

        for assertion in self.state_assertions {
            assertion(&next);
        }

        for assertion in self.event_assertions {
            assertion(&triggered);
        }
    }
}

/// Helper assertions for triggered events
pub mod assertions {
    use pulse_core::Event;

    /// Assert that nothing was triggered
    ///
    /// # Panics
    ///
    /// Panics if events is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_events(events: &[Event]) {
        assert!(
            events.is_empty(),
            "Expected no events, but found {}: {:?}",
            events.len(),
            events
        );
    }

    /// Assert the number of triggered events
    ///
    /// # Panics
    ///
    /// Panics if the number of events doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_events_count(events: &[Event], expected: usize) {
        assert_eq!(
            events.len(),
            expected,
            "Expected {} events, but found {}",
            expected,
            events.len()
        );
    }

    /// Assert that at least one event of `event_type` was triggered and return the first
    ///
    /// # Panics
    ///
    /// Panics if no event of that type is found.
    #[allow(clippy::panic)] // Test assertion
    #[must_use]
    pub fn expect_event<'a>(events: &'a [Event], event_type: &str) -> &'a Event {
        events
            .iter()
            .find(|e| e.is(event_type))
            .unwrap_or_else(|| panic!("Expected a {event_type} event, found {events:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::smallvec;
    use serde_json::json;

    fn echo_module() -> Module {
        Module::new(
            |state: State, event: &Event| {
                if event.is("set") {
                    event.field("value").cloned().unwrap_or(state)
                } else {
                    state
                }
            },
            |state: &State, event: &Event| -> Triggered {
                if event.is("echo") {
                    smallvec![Event::new("echoed").with_field("value", state.clone())]
                } else {
                    smallvec![]
                }
            },
        )
    }

    #[test]
    fn test_module_test_reduces() {
        ModuleTest::new(echo_module())
            .given_state(json!(1))
            .when_event(Event::new("set").with_field("value", 5))
            .then_state(|state| assert_eq!(state, &json!(5)))
            .then_events(assertions::assert_no_events)
            .run();
    }

    #[test]
    fn test_module_test_triggers_from_given_state() {
        ModuleTest::new(echo_module())
            .given_state(json!("before"))
            .when_event(Event::new("echo"))
            .then_state(|state| assert_eq!(state, &json!("before")))
            .then_events(|events| {
                assertions::assert_events_count(events, 1);
                let echoed = assertions::expect_event(events, "echoed");
                assert_eq!(echoed.field("value"), Some(&json!("before")));
            })
            .run();
    }

    #[test]
    fn test_default_state_is_empty_object() {
        ModuleTest::new(echo_module())
            .when_event(Event::new("noop"))
            .then_state(|state| assert_eq!(state, &json!({})))
            .run();
    }
}
