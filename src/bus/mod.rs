//! Event bus: named events shared by the script VM and the dynamic engine.
//!
//! Either side registers events by name with a fixed parameter signature,
//! attaches listeners (engine callables bound to an execution context) and
//! fires. Firing from the VM decodes raw cells per the signature and returns
//! the last successful listener's result as a cell.
//!
//! The registry is process-wide: see [`init`] and [`event_bus`].

mod event;
mod listener;
mod registry;

pub use event::{DispatchReport, Event};
pub use listener::Listener;
pub use registry::Registry;

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::codec::{ArgPassing, ParamTypes};
use crate::config::BridgeConfig;
use crate::engine::{Argument, Callable, ContextId};
use crate::error::RegistryError;
use crate::vm::{Cell, VmMemory};

/// Which listeners of the calling context an unsubscribe removes.
#[derive(Debug, Clone, Copy)]
pub enum Unsubscribe<'a> {
    /// Every listener bound to the context.
    Context,
    One(&'a Callable),
    Each(&'a [Callable]),
}

pub struct EventBus {
    registry: Registry,
    config: BridgeConfig,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn event(&self, name: &str) -> Option<Arc<Event>> {
        self.registry.lookup(name)
    }

    /// Create an event. Fails if the name exists or the signature has an
    /// unknown tag; an existing event is never altered.
    pub fn try_register(&self, name: &str, param_types: &str) -> Result<Arc<Event>, RegistryError> {
        if self.registry.contains(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        let types = ParamTypes::parse(param_types)?;
        let event = self.registry.insert(Event::new(name, types))?;
        debug!(event = name, param_types, "event registered");
        Ok(event)
    }

    pub fn register_event(&self, name: &str, param_types: &str) -> bool {
        match self.try_register(name, param_types) {
            Ok(_) => true,
            Err(err) => {
                warn!(event = name, error = %err, "event registration rejected");
                false
            }
        }
    }

    /// Attach a listener to an existing event. Unknown events and duplicate
    /// listeners are ignored.
    pub fn subscribe(&self, name: &str, listener: Listener) -> bool {
        match self.registry.lookup(name) {
            Some(event) => event.append(listener),
            None => {
                debug!(event = name, "subscribe to unknown event ignored");
                false
            }
        }
    }

    /// Detach listeners of `context`; returns how many were removed.
    pub fn unsubscribe(&self, name: &str, context: ContextId, target: Unsubscribe<'_>) -> usize {
        let Some(event) = self.registry.lookup(name) else {
            return 0;
        };
        match target {
            Unsubscribe::Context => event.remove_context(context),
            Unsubscribe::One(callable) => usize::from(event.remove(context, callable)),
            Unsubscribe::Each(callables) => event.remove_each(context, callables),
        }
    }

    /// Remove every listener bound to `context` from every event, for use
    /// when the context is being torn down.
    pub fn unsubscribe_context(&self, context: ContextId) -> usize {
        self.registry
            .names()
            .iter()
            .map(|name| self.unsubscribe(name, context, Unsubscribe::Context))
            .sum()
    }

    /// Engine-to-engine fire. `None` if the event does not exist.
    pub fn fire(&self, name: &str, args: &[Argument]) -> Option<DispatchReport> {
        let event = self.registry.lookup(name)?;
        Some(event.fire(args))
    }

    /// VM-to-engine fire with raw cells. `None` if the event does not exist.
    pub fn dispatch_from_vm(
        &self,
        name: &str,
        memory: &dyn VmMemory,
        cells: &[Cell],
        passing: ArgPassing,
    ) -> Option<DispatchReport> {
        let event = self.registry.lookup(name)?;
        Some(event.dispatch_from_vm(memory, cells, passing, &self.config))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Global Singleton ────────────────────────────────────────────

static EVENT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Create the process-wide bus with `config`. Returns `false` if it already
/// exists (explicitly initialised or first used with defaults).
pub fn init(config: BridgeConfig) -> bool {
    let mut created = false;
    EVENT_BUS.get_or_init(|| {
        created = true;
        EventBus::with_config(config)
    });
    created
}

/// Get the process-wide bus, creating it with defaults on first use.
pub fn event_bus() -> &'static EventBus {
    EVENT_BUS.get_or_init(EventBus::new)
}
