//! Error types for synadiag-core
//!
//! Every protocol crate converts its failures into [`Error`]. Hosts that
//! speak in integer status codes use [`Error::code`], which maps each
//! variant onto a fixed negative errno-style value.

use thiserror::Error;

/// Core error type shared by the RMI and TCM engines
#[derive(Debug, Error)]
pub enum Error {
    /// Bad caller input (buffer or limit size mismatch, out of range value).
    /// Always reported before any hardware access.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Transport read/write/ioctl failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded poll loop ran out of attempts
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The firmware answered a command with "not implemented"
    #[error("Command 0x{0:02X} not implemented by firmware")]
    NotImplemented(u8),

    /// A buffer could not be allocated
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// The production test id is not known for the active protocol
    #[error("Unsupported production test {0}")]
    UnsupportedTest(u32),

    /// The operation has no meaning for the active protocol
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No candidate device node exists
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// An operation needs an open device
    #[error("Device not open")]
    NotOpen,

    /// A mandatory RMI function block was not found in the PDT
    #[error("Required function F{0:02X} not found")]
    MissingFunction(u8),

    /// Malformed response from the controller
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Negative host status code for this error
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParameter(_) => -22,
            Self::Io(_) => -5,
            Self::Timeout(_) => -110,
            Self::NotImplemented(_) => -38,
            Self::OutOfMemory(_) => -12,
            Self::UnsupportedTest(_) | Self::Unsupported(_) => -95,
            Self::DeviceNotFound(_) | Self::MissingFunction(_) => -19,
            Self::NotOpen => -9,
            Self::Protocol(_) => -71,
        }
    }

    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Shorthand for [`Error::Protocol`]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Short transfer on the transport
    pub fn short_transfer(what: &str, expected: usize, actual: usize) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short {}: expected {} bytes, got {}", what, expected, actual),
        ))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_fixed() {
        assert_eq!(Error::invalid("x").code(), -22);
        assert_eq!(Error::Timeout("poll".into()).code(), -110);
        assert_eq!(Error::NotImplemented(0x2A).code(), -38);
        assert_eq!(Error::UnsupportedTest(99).code(), -95);
        assert_eq!(Error::NotOpen.code(), -9);
        assert_eq!(Error::short_transfer("read", 4, 2).code(), -5);
    }

    #[test]
    fn test_display() {
        let e = Error::MissingFunction(0x54);
        assert_eq!(e.to_string(), "Required function F54 not found");
        let e = Error::NotImplemented(0x2A);
        assert_eq!(e.to_string(), "Command 0x2A not implemented by firmware");
    }
}
