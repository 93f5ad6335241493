//! Device surface.
//!
//! Binds the shared stack to a byte-oriented file abstraction:
//! read pops, write pushes, control resizes.

mod file;
pub mod ioctl;
mod user;

pub use file::{ControlArg, StackDevice, StackHandle};
pub use ioctl::SET_CAPACITY;
pub use user::UserBuffer;
