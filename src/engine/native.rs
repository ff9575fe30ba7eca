//! In-process engine whose callables are Rust closures.
//!
//! Each execution context owns a global object. Closures receive a
//! [`CallFrame`] with the arguments and that global object, and signal a
//! thrown error by returning [`Exception`]. A panicking closure is treated as
//! a thrown error too.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::{Map, Value};

use super::{Argument, Callable, ContextId, Engine, EngineId, ExecutionScope};
use crate::error::ListenerFault;

type NativeFn = dyn Fn(&CallFrame<'_>) -> Result<Value, Exception> + Send + Sync;

/// The function representation stored behind a [`Callable`].
struct NativeFunction {
    name: String,
    body: Box<NativeFn>,
}

/// Build a callable from a Rust closure.
pub fn function<F>(name: &str, body: F) -> Callable
where
    F: Fn(&CallFrame<'_>) -> Result<Value, Exception> + Send + Sync + 'static,
{
    Callable::new(NativeFunction {
        name: name.to_string(),
        body: Box::new(body),
    })
}

/// A value thrown by a native callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub message: String,
}

impl Exception {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<E: std::error::Error> From<E> for Exception {
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

/// Global object of one execution context.
#[derive(Debug, Default)]
pub struct GlobalObject {
    vars: Mutex<Map<String, Value>>,
}

impl GlobalObject {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.vars.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.vars.lock().insert(key.into(), value);
    }
}

static NULL: Value = Value::Null;

/// What a native callable sees when it is invoked.
pub struct CallFrame<'a> {
    pub context: ContextId,
    pub global: &'a GlobalObject,
    pub args: &'a [Argument],
}

impl CallFrame<'_> {
    /// Plain value at `index`; null when missing or not a plain value.
    pub fn arg(&self, index: usize) -> &Value {
        self.args
            .get(index)
            .and_then(Argument::as_value)
            .unwrap_or(&NULL)
    }

    pub fn function(&self, index: usize) -> Option<&Callable> {
        self.args.get(index).and_then(Argument::as_function)
    }

    /// All arguments in plain value form.
    pub fn values(&self) -> Vec<Value> {
        self.args.iter().map(Argument::to_value).collect()
    }
}

pub struct NativeEngine {
    id: EngineId,
    name: String,
    lock: ReentrantMutex<()>,
    contexts: RwLock<HashMap<ContextId, Arc<GlobalObject>>>,
}

impl NativeEngine {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: EngineId::next(),
            name: name.into(),
            lock: ReentrantMutex::new(()),
            contexts: RwLock::new(HashMap::new()),
        })
    }

    pub fn create_context(&self) -> ContextId {
        let id = ContextId::next();
        self.contexts.write().insert(id, Arc::new(GlobalObject::default()));
        tracing::debug!(engine = %self.name, context = %id, "context created");
        id
    }

    /// Tear a context down. Listeners bound to it stay registered until they
    /// are unsubscribed; invoking them afterwards reports a fault.
    pub fn destroy_context(&self, context: ContextId) -> bool {
        self.contexts.write().remove(&context).is_some()
    }

    pub fn has_context(&self, context: ContextId) -> bool {
        self.contexts.read().contains_key(&context)
    }

    pub fn global(&self, context: ContextId) -> Option<Arc<GlobalObject>> {
        self.contexts.read().get(&context).cloned()
    }
}

impl Engine for NativeEngine {
    fn id(&self) -> EngineId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execution_lock(&self) -> &ReentrantMutex<()> {
        &self.lock
    }

    fn invoke(
        &self,
        scope: &ExecutionScope<'_>,
        callable: &Callable,
        args: &[Argument],
    ) -> Result<Value, ListenerFault> {
        if scope.engine() != self.id {
            return Err(ListenerFault::new(format!(
                "scope for {} used on {}",
                scope.engine(),
                self.id
            )));
        }
        let function = callable
            .downcast_ref::<NativeFunction>()
            .ok_or_else(|| ListenerFault::new("callable does not belong to a native engine"))?;
        let global = self
            .global(scope.context())
            .ok_or_else(|| ListenerFault::new(format!("context {} was destroyed", scope.context())))?;

        let frame = CallFrame {
            context: scope.context(),
            global: &global,
            args,
        };
        let stack = || format!("    at {} ({}, {})", function.name, self.name, scope.context());

        match catch_unwind(AssertUnwindSafe(|| (function.body)(&frame))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(exception)) => Err(ListenerFault::new(exception.message).with_stack(stack())),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ListenerFault::new(format!("listener panicked: {message}")).with_stack(stack()))
            }
        }
    }
}
