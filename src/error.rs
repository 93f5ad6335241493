//! Error types for the integer stack device.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stack device operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stack, device and gate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Argument violates a contract (short buffer, zero capacity, bad argument form).
    #[error("Invalid argument: {0}")]
    Invalid(String),

    /// Pop on an empty stack.
    #[error("Stack is empty")]
    Empty,

    /// Push on a full stack.
    #[error("Stack is full")]
    OutOfRange,

    /// Allocation failed during construction or resize.
    #[error("Out of memory")]
    NoMemory,

    /// Transfer to or from user memory failed.
    #[error("Bad address")]
    CopyFault,

    /// Unknown control command.
    #[error("Unsupported control command: {0:#010x}")]
    NotSupported(u32),

    /// Failed to claim major number, class or node on attach.
    #[error("Device registration failed: {0}")]
    BusRegistration(String),

    /// No device node exists at the path.
    #[error("No such device: {0}")]
    DeviceAbsent(PathBuf),

    /// Resource is held by someone else.
    #[error("Resource busy: {0}")]
    Busy(String),

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error on a real device file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The errno a character device driver returns for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::Invalid(_) | Error::Config(_) => libc::EINVAL,
            Error::Empty => libc::ENODATA,
            Error::OutOfRange => libc::ERANGE,
            Error::NoMemory => libc::ENOMEM,
            Error::CopyFault => libc::EFAULT,
            Error::NotSupported(_) => libc::ENOTTY,
            Error::BusRegistration(_) => libc::ENODEV,
            Error::DeviceAbsent(_) => libc::ENOENT,
            Error::Busy(_) => libc::EBUSY,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// Classify an I/O error returned by a real device node.
    ///
    /// `ENOTTY` only has meaning for a control call, so it stays an `Io`
    /// error here; see [`Error::from_ioctl`].
    pub fn from_io(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EINVAL) => Error::Invalid(err.to_string()),
            Some(libc::ERANGE) => Error::OutOfRange,
            Some(libc::ENOMEM) => Error::NoMemory,
            Some(libc::EFAULT) => Error::CopyFault,
            Some(libc::EBUSY) => Error::Busy(err.to_string()),
            _ => Error::Io(err),
        }
    }

    /// Classify the failure of control command `cmd` on a real device node.
    pub fn from_ioctl(err: std::io::Error, cmd: u32) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOTTY) => Error::NotSupported(cmd),
            _ => Error::from_io(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
