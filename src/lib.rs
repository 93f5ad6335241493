//! Integer Stack Device
//!
//! A capacity-bounded stack of `i32` exposed as a character device whose
//! node exists only while a recognized hardware token is on the bus.
//!
//! # Features
//!
//! - **Stack Core**: bounded LIFO with push, pop and transactional resize
//! - **Device Surface**: read pops, write pushes, `SET_CAPACITY` resizes
//! - **Presence Gate**: node published on token attach, removed on detach
//! - **CLI Client**: `push`, `pop`, `unwind` and `set-size` against a node
//!
//! # Architecture
//!
//! ```text
//! Bus event → PresenceGate → (un)publish node → open → StackHandle → SharedStack
//! ```
//!
//! # Example
//!
//! ```rust
//! use int_stack::config::{GateConfig, DS4_V1};
//! use int_stack::gate::{Bus, DevFs, UsbInterface};
//! use int_stack::IntStackModule;
//!
//! let devfs = DevFs::new("/dev");
//! let bus = Bus::new();
//! let module = IntStackModule::load(GateConfig::default(), devfs.clone(), bus.clone()).unwrap();
//!
//! // Plug the token in: /dev/int_stack appears
//! bus.attach(UsbInterface::new(1, 2, DS4_V1)).unwrap();
//! let handle = devfs.open(&module.node_path()).unwrap();
//!
//! handle.write(&42i32.to_ne_bytes()).unwrap();
//! let mut buf = [0u8; 4];
//! assert_eq!(handle.read(&mut buf).unwrap(), 4);
//! assert_eq!(i32::from_ne_bytes(buf), 42);
//! ```

pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod gate;
pub mod module;
pub mod stack;

pub use config::GateConfig;
pub use device::{StackDevice, StackHandle};
pub use error::{Error, Result};
pub use module::IntStackModule;
