use crate::vm::Cell;

/// Failure to resolve or decode a VM-side argument.
///
/// Any of these aborts the dispatch in progress: remaining arguments are not
/// decoded and remaining listeners are not invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    #[error("can't resolve VM address {addr:#x}")]
    InvalidAddress { addr: Cell },

    #[error("missing raw cell {cell} for argument slot {slot}")]
    MissingArgument { slot: usize, cell: usize },

    #[error("string at {addr:#x} runs past the end of VM memory")]
    UnterminatedString { addr: Cell },

    #[error("string of {len} characters exceeds the limit of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("string at {addr:#x} is not valid UTF-8")]
    InvalidUtf8 { addr: Cell },

    #[error("negative array length {len}")]
    NegativeLength { len: Cell },

    #[error("array of {len} elements exceeds the limit of {max}")]
    ArrayTooLong { len: usize, max: usize },

    #[error("array at {addr:#x} with {len} elements runs past the end of VM memory")]
    ArrayOutOfBounds { addr: Cell, len: usize },
}

/// A `paramTypes` string that contains something other than a known tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("unknown type tag '{tag}' at position {position}")]
    UnknownTag { tag: char, position: usize },
}

/// An error thrown by a listener, captured at the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ListenerFault {
    pub message: String,
    pub stack: Option<String>,
}

impl ListenerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("event '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_error_formats_address_in_hex() {
        let err = MarshalError::InvalidAddress { addr: 0x40 };
        assert_eq!(err.to_string(), "can't resolve VM address 0x40");
    }

    #[test]
    fn listener_fault_displays_message_only() {
        let fault = ListenerFault::new("boom").with_stack("    at handler");
        assert_eq!(fault.to_string(), "boom");
        assert_eq!(fault.stack.as_deref(), Some("    at handler"));
    }

    #[test]
    fn registry_error_wraps_signature_error() {
        let err: RegistryError = SignatureError::UnknownTag {
            tag: 'x',
            position: 2,
        }
        .into();
        assert_eq!(err.to_string(), "unknown type tag 'x' at position 2");
    }
}
