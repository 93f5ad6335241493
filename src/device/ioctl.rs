//! Linux ioctl number encoding.
//!
//! ```text
//!  31  30 29          16 15       8 7        0
//! +------+--------------+----------+----------+
//! | dir  |     size     |   type   |    nr    |
//! +------+--------------+----------+----------+
//! ```

use crate::config::ioctl_params;

const NR_BITS: u32 = 8;
const TYPE_BITS: u32 = 8;
const SIZE_BITS: u32 = 14;
const DIR_BITS: u32 = 2;

const NR_SHIFT: u32 = 0;
const TYPE_SHIFT: u32 = NR_SHIFT + NR_BITS;
const SIZE_SHIFT: u32 = TYPE_SHIFT + TYPE_BITS;
const DIR_SHIFT: u32 = SIZE_SHIFT + SIZE_BITS;

/// No data transfer.
pub const DIR_NONE: u32 = 0;
/// Userland writes, driver reads.
pub const DIR_WRITE: u32 = 1;
/// Driver writes, userland reads.
pub const DIR_READ: u32 = 2;

/// `_IOW('S', 1, u32)`: set the stack capacity from a user-space `u32`.
pub const SET_CAPACITY: u32 = iow(
    ioctl_params::MAGIC,
    ioctl_params::SET_CAPACITY_NR,
    ioctl_params::SET_CAPACITY_ARG_SIZE,
);

/// Encode a command number (`_IOC`).
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << DIR_SHIFT)
        | (((size as u32) & ((1 << SIZE_BITS) - 1)) << SIZE_SHIFT)
        | ((ty as u32) << TYPE_SHIFT)
        | ((nr as u32) << NR_SHIFT)
}

/// `_IOW`.
pub const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(DIR_WRITE, ty, nr, size)
}

/// `_IOR`.
pub const fn ior(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(DIR_READ, ty, nr, size)
}

/// Fields of an encoded command number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlCmd {
    pub dir: u32,
    pub ty: u8,
    pub nr: u8,
    pub size: usize,
}

impl IoctlCmd {
    /// Split a command number into its fields.
    pub fn decode(cmd: u32) -> Self {
        Self {
            dir: (cmd >> DIR_SHIFT) & ((1 << DIR_BITS) - 1),
            ty: ((cmd >> TYPE_SHIFT) & ((1 << TYPE_BITS) - 1)) as u8,
            nr: ((cmd >> NR_SHIFT) & ((1 << NR_BITS) - 1)) as u8,
            size: ((cmd >> SIZE_SHIFT) & ((1 << SIZE_BITS) - 1)) as usize,
        }
    }
}
