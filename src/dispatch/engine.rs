//! Entry points called from the dynamic engine.

use tracing::trace;

use crate::bus::{EventBus, Listener, Unsubscribe};
use crate::engine::{Callable, ContextId, EngineRef};

pub use crate::engine::Argument;

/// The engine and execution context a call came from.
#[derive(Clone)]
pub struct Caller {
    pub engine: EngineRef,
    pub context: ContextId,
}

impl Caller {
    pub fn new(engine: EngineRef, context: ContextId) -> Self {
        Self { engine, context }
    }
}

/// `registerEvent(name, paramTypes) -> bool`
pub fn register_event(bus: &EventBus, args: &[Argument]) -> bool {
    match args {
        [name, types, ..] => match (name.as_str(), types.as_str()) {
            (Some(name), Some(types)) => bus.register_event(name, types),
            _ => false,
        },
        _ => false,
    }
}

/// `on(name, ..., callback)`: the last argument, if it is a function, is
/// bound to the caller's context.
pub fn on(bus: &EventBus, caller: &Caller, args: &[Argument]) {
    let Some(name) = args.first().and_then(Argument::as_str) else {
        return;
    };
    let Some(callable) = args.last().and_then(Argument::as_function) else {
        trace!(event = name, "on() without a callback ignored");
        return;
    };
    bus.subscribe(
        name,
        Listener::new(caller.engine.clone(), caller.context, callable.clone()),
    );
}

/// `removeListener(name, target?)`: no target removes all of the caller's
/// listeners; a function removes one; a list removes each function in it.
pub fn remove_listener(bus: &EventBus, caller: &Caller, args: &[Argument]) {
    let Some(name) = args.first().and_then(Argument::as_str) else {
        return;
    };
    match args.get(1) {
        None => {
            bus.unsubscribe(name, caller.context, Unsubscribe::Context);
        }
        Some(Argument::Function(callable)) => {
            bus.unsubscribe(name, caller.context, Unsubscribe::One(callable));
        }
        Some(Argument::List(items)) => {
            let callables: Vec<Callable> = items.iter().filter_map(Argument::as_function).cloned().collect();
            bus.unsubscribe(name, caller.context, Unsubscribe::Each(&callables));
        }
        Some(Argument::Value(_)) => {
            trace!(event = name, "removeListener() with a non-function target ignored");
        }
    }
}

/// `fire(name, ...args)`: broadcast to every listener; results are dropped.
/// Arguments, functions included, reach listeners as given.
pub fn fire(bus: &EventBus, args: &[Argument]) {
    let Some((name, rest)) = args.split_first() else {
        return;
    };
    let Some(name) = name.as_str() else {
        return;
    };
    bus.fire(name, rest);
}
