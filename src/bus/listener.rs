use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::engine::{Argument, Callable, ContextId, EngineRef, ExecutionScope};
use crate::error::ListenerFault;

/// A callable bound to the execution context it was registered under.
///
/// Equality and hashing look only at the context and the callable's
/// identity, never at the engine or the function's contents.
#[derive(Clone)]
pub struct Listener {
    engine: EngineRef,
    context: ContextId,
    callable: Callable,
}

impl Listener {
    pub fn new(engine: EngineRef, context: ContextId, callable: Callable) -> Self {
        Self {
            engine,
            context,
            callable,
        }
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn matches(&self, context: ContextId, callable: &Callable) -> bool {
        self.context == context && self.callable.is_same(callable)
    }

    /// Lock the owning engine, enter the bound context, build the arguments
    /// inside that critical section and call.
    ///
    /// `args` runs with the lock held; if it fails, the callable is not
    /// invoked and the error is returned as `Err(Err(..))`.
    pub(crate) fn invoke_with<E>(
        &self,
        args: impl FnOnce() -> Result<Vec<Argument>, E>,
    ) -> Result<Result<Value, ListenerFault>, E> {
        let scope = ExecutionScope::enter(&*self.engine, self.context);
        let args = args()?;
        Ok(self.engine.invoke(&scope, &self.callable, &args))
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.context, &other.callable)
    }
}

impl Eq for Listener {}

impl Hash for Listener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.context.hash(state);
        self.callable.identity().hash(state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("engine", &self.engine.id())
            .field("context", &self.context)
            .field("callable", &self.callable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::engine::native::{NativeEngine, function};
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn equality_is_context_plus_callable() {
        let engine = NativeEngine::new("test");
        let ctx_a = engine.create_context();
        let ctx_b = engine.create_context();
        let f = function("f", |_| Ok(Value::Null));
        let g = function("g", |_| Ok(Value::Null));

        let a_f = Listener::new(engine.clone(), ctx_a, f.clone());
        assert_eq!(a_f, Listener::new(engine.clone(), ctx_a, f.clone()));
        assert_ne!(a_f, Listener::new(engine.clone(), ctx_b, f.clone()));
        assert_ne!(a_f, Listener::new(engine.clone(), ctx_a, g));

        let set: HashSet<_> = [a_f.clone(), a_f.clone()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn invoke_builds_args_under_lock() {
        let engine = NativeEngine::new("test");
        let ctx = engine.create_context();
        let echo = function("echo", |frame| Ok(frame.arg(0).clone()));
        let listener = Listener::new(engine.clone(), ctx, echo);

        let held = std::cell::Cell::new(false);
        let result = listener
            .invoke_with(|| {
                // Re-entrant: only succeeds because this thread owns the lock.
                held.set(engine.execution_lock().try_lock().is_some());
                Ok::<_, ()>(vec![json!("x").into()])
            })
            .unwrap();
        assert!(held.get());
        assert_eq!(result, Ok(json!("x")));
    }

    #[test]
    fn failed_args_skip_the_call() {
        let engine = NativeEngine::new("test");
        let ctx = engine.create_context();
        let called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = called.clone();
        let listener = Listener::new(
            engine,
            ctx,
            function("f", move |_| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(Value::Null)
            }),
        );
        assert_eq!(listener.invoke_with(|| Err::<Vec<Argument>, _>("bad")), Err("bad"));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }
}
