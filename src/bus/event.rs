use parking_lot::Mutex;
use tracing::{debug, error, trace};

use super::Listener;
use crate::codec::{ArgPassing, Decoder, ParamTypes};
use crate::config::BridgeConfig;
use crate::engine::{Argument, Callable, ContextId, to_int32};
use crate::error::{ListenerFault, MarshalError};
use crate::vm::{Cell, VmMemory};

/// Outcome of one fire of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Return value of the last listener that returned normally, or 0.
    pub result: Cell,
    /// Listeners actually invoked (faulted ones included).
    pub invoked: usize,
    pub faults: Vec<ListenerFault>,
    /// Set when decoding VM arguments failed and the dispatch was aborted.
    pub marshal_error: Option<MarshalError>,
}

impl DispatchReport {
    pub fn is_aborted(&self) -> bool {
        self.marshal_error.is_some()
    }
}

/// A named event: a fixed parameter signature plus its ordered listeners.
#[derive(Debug)]
pub struct Event {
    name: String,
    param_types: ParamTypes,
    listeners: Mutex<Vec<Listener>>,
}

impl Event {
    pub fn new(name: impl Into<String>, param_types: ParamTypes) -> Self {
        Self {
            name: name.into(),
            param_types,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_types(&self) -> &ParamTypes {
        &self.param_types
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Copy of the current listeners, in insertion order.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.listeners.lock().clone()
    }

    fn is_live(&self, listener: &Listener) -> bool {
        self.listeners.lock().contains(listener)
    }

    /// Append a listener. Returns `false` if an equal listener is already
    /// present; the duplicate is dropped.
    pub fn append(&self, listener: Listener) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.contains(&listener) {
            trace!(event = %self.name, context = %listener.context(), "duplicate listener ignored");
            return false;
        }
        debug!(event = %self.name, context = %listener.context(), "listener added");
        listeners.push(listener);
        true
    }

    /// Remove the listener bound to `context` with this callable.
    pub fn remove(&self, context: ContextId, callable: &Callable) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !l.matches(context, callable));
        before != listeners.len()
    }

    /// Remove each listener of `context` whose callable is in `callables`.
    pub fn remove_each(&self, context: ContextId, callables: &[Callable]) -> usize {
        callables
            .iter()
            .filter(|callable| self.remove(context, callable))
            .count()
    }

    /// Remove every listener bound to `context`.
    pub fn remove_context(&self, context: ContextId) -> usize {
        let snapshot = self.snapshot();
        let mut removed = 0;
        for listener in snapshot.iter().filter(|l| l.context() == context) {
            if self.remove(context, listener.callable()) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(event = %self.name, %context, removed, "context listeners removed");
        }
        removed
    }

    pub fn remove_all(&self) {
        self.listeners.lock().clear();
    }

    /// Engine-to-engine fire. `args` are passed to every listener unchanged.
    pub fn fire(&self, args: &[Argument]) -> DispatchReport {
        self.dispatch(|| Ok(args.to_vec()))
    }

    /// VM-to-engine fire. `cells` are decoded against this event's signature
    /// for every listener, inside that listener's engine lock.
    pub fn dispatch_from_vm(
        &self,
        memory: &dyn VmMemory,
        cells: &[Cell],
        passing: ArgPassing,
        config: &BridgeConfig,
    ) -> DispatchReport {
        let decoder = Decoder::new(memory, passing, config);
        self.dispatch(|| {
            decoder
                .decode_all(&self.param_types, cells)
                .map(|values| values.into_iter().map(Argument::Value).collect())
        })
    }

    fn dispatch<F>(&self, mut args: F) -> DispatchReport
    where
        F: FnMut() -> Result<Vec<Argument>, MarshalError>,
    {
        let mut report = DispatchReport::default();

        // Listeners may subscribe or unsubscribe (themselves or others) while
        // they run, so iterate a copy and re-check membership before each call.
        for listener in self.snapshot() {
            if !self.is_live(&listener) {
                trace!(event = %self.name, context = %listener.context(), "listener removed mid-fire, skipped");
                continue;
            }

            let outcome = match listener.invoke_with(&mut args) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(event = %self.name, error = %err, "Can't marshal event argument");
                    report.marshal_error = Some(err);
                    break;
                }
            };

            report.invoked += 1;
            match outcome {
                Ok(value) => report.result = to_int32(&value),
                Err(fault) => {
                    error!(
                        event = %self.name,
                        context = %listener.context(),
                        stack = fault.stack.as_deref().unwrap_or("<no stack>"),
                        "Exception thrown: {}",
                        fault.message
                    );
                    report.faults.push(fault);
                }
            }
        }

        trace!(
            event = %self.name,
            invoked = report.invoked,
            faults = report.faults.len(),
            result = report.result,
            "dispatch finished"
        );
        report
    }
}
