//! Presence gate.
//!
//! This module handles:
//! - Dispatching token attach/detach events from the bus to drivers
//! - Publishing the device node while a recognized token is present
//! - The device namespace the node lives in

mod bus;
mod devfs;
mod presence;

pub use bus::{Bus, BusEvent, PortId, UsbDriver, UsbInterface};
pub use devfs::{ClassId, DevFs, DevT, NodeRegistrar, RegistrationStage};
pub use presence::{PresenceGate, PresenceState};
