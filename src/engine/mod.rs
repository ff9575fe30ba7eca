//! Dynamic engine abstraction.
//!
//! The bus never touches engine values directly. It holds opaque handles
//! (engine, execution context, persistent callable) and asks the owning engine
//! to run a callable while that engine's exclusive execution lock is held.

mod argument;
pub mod native;
mod value;

pub use argument::Argument;
pub use value::to_int32;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde_json::Value;

use crate::error::ListenerFault;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u64);

impl EngineId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Identifies one execution context (global scope) inside an engine.
///
/// Ids are unique across all engines in the process, so a context id alone
/// is enough to tell two listeners' scopes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Persistent handle to a function value owned by an engine.
///
/// Cloning shares the handle. Two handles are the same callable iff they point
/// at the same underlying function, which stays alive for as long as any
/// handle to it exists.
#[derive(Clone)]
pub struct Callable {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Callable {
    pub fn new<T: Any + Send + Sync>(function: T) -> Self {
        Self {
            inner: Arc::new(function),
        }
    }

    /// Address of the underlying function; stable while the handle lives.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn is_same(&self, other: &Callable) -> bool {
        self.identity() == other.identity()
    }

    /// Access the engine-specific function representation.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({:#x})", self.identity())
    }
}

/// An engine instance that can run callables on behalf of the bus.
pub trait Engine: Send + Sync {
    fn id(&self) -> EngineId;

    fn name(&self) -> &str;

    /// The instance's exclusive execution lock. It must be re-entrant so a
    /// listener can fire events back into its own engine.
    fn execution_lock(&self) -> &ReentrantMutex<()>;

    /// Call `callable` with `args` against the global object of the scope's
    /// context. Anything the callable throws comes back as a fault.
    fn invoke(
        &self,
        scope: &ExecutionScope<'_>,
        callable: &Callable,
        args: &[Argument],
    ) -> Result<Value, ListenerFault>;
}

/// Proof that an engine's execution lock is held and a context is entered.
///
/// Dropping the scope releases the lock.
pub struct ExecutionScope<'e> {
    _guard: ReentrantMutexGuard<'e, ()>,
    engine: EngineId,
    context: ContextId,
}

impl<'e> ExecutionScope<'e> {
    /// Block until the engine's lock is acquired, then enter `context`.
    pub fn enter(engine: &'e dyn Engine, context: ContextId) -> Self {
        let guard = engine.execution_lock().lock();
        Self {
            _guard: guard,
            engine: engine.id(),
            context,
        }
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    pub fn context(&self) -> ContextId {
        self.context
    }
}

impl fmt::Debug for ExecutionScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("engine", &self.engine)
            .field("context", &self.context)
            .finish()
    }
}

/// Convenience for holding any engine behind the bus's shared handle.
pub type EngineRef = Arc<dyn Engine>;
