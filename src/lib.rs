#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

//! Named-event bus between a cell-based script VM and a dynamic scripting
//! engine.
//!
//! ```
//! use eventbridge::bus::{EventBus, Listener};
//! use eventbridge::dispatch;
//! use eventbridge::engine::native::{NativeEngine, function};
//! use eventbridge::vm::DataSegment;
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! let engine = NativeEngine::new("scripts");
//! let ctx = engine.create_context();
//!
//! bus.register_event("onTest", "i");
//! bus.subscribe(
//!     "onTest",
//!     Listener::new(engine, ctx, function("double", |frame| {
//!         Ok(json!(frame.arg(0).as_i64().unwrap_or(0) * 2))
//!     })),
//! );
//!
//! let memory = DataSegment::new();
//! assert_eq!(dispatch::vm::dispatch(&bus, "onTest", &memory, &[21]), 42);
//! ```

pub mod bus;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod vm;

pub use bus::{EventBus, event_bus};
pub use config::BridgeConfig;
pub use error::{ListenerFault, MarshalError, RegistryError, SignatureError};
