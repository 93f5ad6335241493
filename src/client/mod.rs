//! Command-line client for the stack device.
//!
//! Each command maps onto one system call on the node: `push` writes,
//! `pop` reads once, `unwind` reads until end-of-stream and `set-size`
//! issues `SET_CAPACITY`.

mod device_file;

pub use device_file::DeviceFile;

use crate::device::{ControlArg, StackHandle, SET_CAPACITY};
use crate::error::{Error, Result};
use std::io::{self, Write};

/// Printed when overflow is reported.
pub const ERR_STACK_FULL: &str = "ERROR: stack is full";

/// Printed when set-size is given a non-positive value.
pub const ERR_INVALID_SIZE: &str = "ERROR: size should be > 0";

/// Printed when the node cannot be opened.
pub const ERR_DEVICE_ACCESS: &str =
    "ERROR: could not access the device file. Is the module loaded?";

/// Printed when SET_CAPACITY fails.
pub const ERR_DEVICE_IOCTL: &str = "ERROR: ioctl operation failed";

/// Printed by pop and unwind when the stack is empty.
pub const EMPTY_MARKER: &str = "NULL";

/// Exit status for failures.
pub const EXIT_FAILURE: i32 = 1;

/// One client invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Push(i32),
    Pop,
    Unwind,
    SetSize(i64),
}

/// A command whose arguments passed client-side validation.
enum Request {
    Push(i32),
    Pop,
    Unwind,
    SetCapacity(u32),
}

/// Something the client can push to, pop from and resize.
pub trait StackEndpoint {
    fn push(&mut self, value: i32) -> Result<()>;

    /// `None` when the stack is empty.
    fn pop(&mut self) -> Result<Option<i32>>;

    fn set_capacity(&mut self, capacity: u32) -> Result<()>;
}

impl StackEndpoint for StackHandle {
    fn push(&mut self, value: i32) -> Result<()> {
        self.write(&value.to_ne_bytes()).map(|_| ())
    }

    fn pop(&mut self) -> Result<Option<i32>> {
        let mut buf = [0u8; 4];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(i32::from_ne_bytes(buf))),
        }
    }

    fn set_capacity(&mut self, capacity: u32) -> Result<()> {
        let arg = capacity.to_ne_bytes();
        self.control(SET_CAPACITY, ControlArg::UserPtr(&arg))
    }
}

/// Run `command`, opening the endpoint with `open` only when needed.
///
/// Data goes to `out`, diagnostics to `err`. Returns the process exit
/// status.
pub fn execute<E, F, O, W>(command: Command, open: F, out: &mut O, err: &mut W) -> io::Result<i32>
where
    E: StackEndpoint,
    F: FnOnce() -> Result<E>,
    O: Write,
    W: Write,
{
    let request = match command {
        Command::Push(value) => Request::Push(value),
        Command::Pop => Request::Pop,
        Command::Unwind => Request::Unwind,
        Command::SetSize(size) if size <= 0 => {
            writeln!(err, "{}", ERR_INVALID_SIZE)?;
            return Ok(EXIT_FAILURE);
        }
        Command::SetSize(size) => match u32::try_from(size) {
            Ok(capacity) => Request::SetCapacity(capacity),
            Err(_) => {
                writeln!(err, "ERROR: size should be <= {}", u32::MAX)?;
                return Ok(EXIT_FAILURE);
            }
        },
    };

    let mut endpoint = match open() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::debug!(error = %e, "client: open failed");
            writeln!(err, "{}", ERR_DEVICE_ACCESS)?;
            return Ok(EXIT_FAILURE);
        }
    };

    match request {
        Request::Push(value) => match endpoint.push(value) {
            Ok(()) => Ok(0),
            Err(Error::OutOfRange) => {
                writeln!(err, "{}", ERR_STACK_FULL)?;
                Ok(EXIT_FAILURE)
            }
            Err(e) => {
                writeln!(err, "ERROR: push operation failed: {}", e)?;
                Ok(EXIT_FAILURE)
            }
        },

        Request::Pop => match endpoint.pop() {
            Ok(Some(value)) => {
                writeln!(out, "{}", value)?;
                Ok(0)
            }
            Ok(None) => {
                writeln!(out, "{}", EMPTY_MARKER)?;
                Ok(0)
            }
            Err(e) => {
                writeln!(err, "ERROR: pop operation failed: {}", e)?;
                Ok(EXIT_FAILURE)
            }
        },

        Request::Unwind => {
            let mut count = 0usize;
            loop {
                match endpoint.pop() {
                    Ok(Some(value)) => {
                        writeln!(out, "{}", value)?;
                        count += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        writeln!(err, "ERROR: pop operation failed: {}", e)?;
                        return Ok(EXIT_FAILURE);
                    }
                }
            }
            if count == 0 {
                writeln!(out, "{}", EMPTY_MARKER)?;
            }
            Ok(0)
        }

        Request::SetCapacity(capacity) => match endpoint.set_capacity(capacity) {
            Ok(()) => Ok(0),
            Err(e) => {
                writeln!(err, "{} ({})", ERR_DEVICE_IOCTL, e)?;
                Ok(EXIT_FAILURE)
            }
        },
    }
}
