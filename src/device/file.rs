//! File operations of the stack device.

use crate::config::ELEMENT_SIZE;
use crate::device::ioctl::{IoctlCmd, SET_CAPACITY};
use crate::device::user::UserBuffer;
use crate::error::{Error, Result};
use crate::stack::SharedStack;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Argument of a control call.
#[derive(Clone, Copy)]
pub enum ControlArg<'a> {
    /// Pointer into caller memory.
    UserPtr(&'a dyn UserBuffer),
    /// Plain integer argument.
    Scalar(u64),
}

/// The stack device: lazily built stack plus the module pin count.
///
/// The stack is constructed on the first open, not when the node is
/// published, so publishing never fails for lack of memory. It lives until
/// [`StackDevice::cleanup`], which refuses while any handle is open.
#[derive(Debug)]
pub struct StackDevice {
    default_capacity: u32,
    stack: Mutex<Option<Arc<SharedStack>>>,
    pins: Mutex<usize>,
    unpinned: Condvar,
}

impl StackDevice {
    /// Create a device whose stack will start with `default_capacity`.
    pub fn new(default_capacity: u32) -> Arc<Self> {
        Arc::new(Self {
            default_capacity,
            stack: Mutex::new(None),
            pins: Mutex::new(0),
            unpinned: Condvar::new(),
        })
    }

    /// Open a handle, building the stack if this is the first open.
    pub fn open(self: &Arc<Self>) -> Result<StackHandle> {
        let mut slot = lock(&self.stack);
        let stack = match slot.clone() {
            Some(stack) => stack,
            None => {
                let stack = Arc::new(SharedStack::with_capacity(self.default_capacity)?);
                *slot = Some(Arc::clone(&stack));
                stack
            }
        };
        // Pinned under the slot lock; cleanup checks pins under it too.
        *lock(&self.pins) += 1;
        drop(slot);
        tracing::info!("int_stack: device opened");

        Ok(StackHandle {
            device: Arc::clone(self),
            stack,
        })
    }

    fn release(&self) {
        let mut pins = lock(&self.pins);
        *pins = pins.saturating_sub(1);
        if *pins == 0 {
            self.unpinned.notify_all();
        }
        tracing::info!("int_stack: device released");
    }

    /// Number of open handles.
    pub fn pins(&self) -> usize {
        *lock(&self.pins)
    }

    /// Block until every handle has been released.
    pub fn wait_unpinned(&self) {
        let pins = lock(&self.pins);
        let _pins = self
            .unpinned
            .wait_while(pins, |pins| *pins > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_unpinned`](Self::wait_unpinned) but gives up after
    /// `timeout`. Returns whether the device is unpinned.
    pub fn wait_unpinned_timeout(&self, timeout: Duration) -> bool {
        let pins = lock(&self.pins);
        let (pins, _) = self
            .unpinned
            .wait_timeout_while(pins, timeout, |pins| *pins > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *pins == 0
    }

    /// Whether the stack has been built.
    pub fn is_instantiated(&self) -> bool {
        lock(&self.stack).is_some()
    }

    /// The live stack, if built.
    pub fn stack(&self) -> Option<Arc<SharedStack>> {
        lock(&self.stack).clone()
    }

    /// Wait for every handle to be released, then free the stack.
    ///
    /// Handles opened while waiting are waited for as well.
    pub fn drain(&self) {
        while let Err(e) = self.cleanup() {
            tracing::debug!(error = %e, "int_stack: waiting for open handles");
            self.wait_unpinned();
        }
    }

    /// Free the stack. Fails with `Busy` while handles are open.
    pub fn cleanup(&self) -> Result<()> {
        let mut slot = lock(&self.stack);
        let pins = *lock(&self.pins);
        if pins > 0 {
            return Err(Error::Busy(format!("{} handle(s) still open", pins)));
        }
        if slot.take().is_some() {
            tracing::info!("int_stack: stack freed");
        }
        Ok(())
    }
}

/// An open handle on the stack device.
///
/// The handle keeps the stack alive even after the node is unpublished;
/// dropping it releases the module pin.
#[derive(Debug)]
pub struct StackHandle {
    device: Arc<StackDevice>,
    stack: Arc<SharedStack>,
}

impl StackHandle {
    /// Pop one integer into `buf`.
    ///
    /// Returns the number of bytes written: `ELEMENT_SIZE`, or 0 when the
    /// stack is empty.
    pub fn read<B: UserBuffer + ?Sized>(&self, buf: &mut B) -> Result<usize> {
        if buf.len() < ELEMENT_SIZE {
            return Err(Error::Invalid(format!(
                "read buffer of {} bytes, need {}",
                buf.len(),
                ELEMENT_SIZE
            )));
        }

        let value = match self.stack.pop() {
            Ok(value) => value,
            Err(Error::Empty) => return Ok(0),
            Err(e) => return Err(e),
        };

        buf.copy_to_user(&value.to_ne_bytes())?;
        Ok(ELEMENT_SIZE)
    }

    /// Push one integer taken from the start of `buf`.
    pub fn write<B: UserBuffer + ?Sized>(&self, buf: &B) -> Result<usize> {
        if buf.len() < ELEMENT_SIZE {
            return Err(Error::Invalid(format!(
                "write buffer of {} bytes, need {}",
                buf.len(),
                ELEMENT_SIZE
            )));
        }

        let mut raw = [0u8; ELEMENT_SIZE];
        buf.copy_from_user(&mut raw)?;
        self.stack.push(i32::from_ne_bytes(raw))?;
        Ok(ELEMENT_SIZE)
    }

    /// Positional read; the offset is ignored, every read acts on the top.
    pub fn read_at<B: UserBuffer + ?Sized>(&self, buf: &mut B, _offset: u64) -> Result<usize> {
        self.read(buf)
    }

    /// Positional write; the offset is ignored.
    pub fn write_at<B: UserBuffer + ?Sized>(&self, buf: &B, _offset: u64) -> Result<usize> {
        self.write(buf)
    }

    /// Handle a control command.
    ///
    /// `SET_CAPACITY` only accepts a pointer to a `u32`; a scalar argument is
    /// rejected with `Invalid`.
    pub fn control(&self, cmd: u32, arg: ControlArg<'_>) -> Result<()> {
        if cmd != SET_CAPACITY {
            tracing::debug!(?cmd, decoded = ?IoctlCmd::decode(cmd), "int_stack: unknown ioctl");
            return Err(Error::NotSupported(cmd));
        }

        let ptr = match arg {
            ControlArg::UserPtr(ptr) => ptr,
            ControlArg::Scalar(value) => {
                return Err(Error::Invalid(format!(
                    "SET_CAPACITY takes a pointer to u32, got scalar {}",
                    value
                )))
            }
        };

        let mut raw = [0u8; 4];
        ptr.copy_from_user(&mut raw)?;
        let new_capacity = u32::from_ne_bytes(raw);
        if new_capacity == 0 {
            return Err(Error::Invalid("capacity must be greater than 0".to_string()));
        }

        self.stack.resize(new_capacity)
    }

    /// The device this handle was opened on.
    pub fn device(&self) -> &Arc<StackDevice> {
        &self.device
    }
}

impl Drop for StackHandle {
    fn drop(&mut self) {
        self.device.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
