//! Boundary entry points.
//!
//! These are the operations each runtime's binding table points at. They
//! validate loosely-typed input, resolve the event by name and delegate to
//! [`crate::bus::Event`]. A malformed call is a silent no-op returning the
//! default value; nothing here returns an error to the caller.

pub mod engine;
pub mod vm;
