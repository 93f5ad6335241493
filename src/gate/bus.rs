//! Hardware bus: attached interfaces and the drivers bound to them.

use crate::config::TokenIdentity;
use crate::error::{Error, Result};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Physical location of an interface: bus number, device address,
/// interface number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    pub bus: u8,
    pub address: u8,
    pub interface: u8,
}

/// An interface of a device attached to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbInterface {
    pub port: PortId,
    pub id: TokenIdentity,
}

impl UsbInterface {
    pub fn new(bus: u8, address: u8, id: TokenIdentity) -> Self {
        Self {
            port: PortId {
                bus,
                address,
                interface: 0,
            },
            id,
        }
    }
}

/// Event delivered by the bus.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Attach(UsbInterface),
    Detach(PortId),
}

/// A driver that binds to interfaces matching its id table.
pub trait UsbDriver: Send + Sync {
    /// Unique driver name.
    fn name(&self) -> &str;

    /// Identities this driver binds to.
    fn id_table(&self) -> &[TokenIdentity];

    /// Called when a matching interface appears. An error leaves the
    /// interface unbound.
    fn probe(&self, intf: &UsbInterface) -> Result<()>;

    /// Called when a bound interface goes away or the driver is removed.
    fn disconnect(&self, intf: &UsbInterface);

    fn matches(&self, intf: &UsbInterface) -> bool {
        self.id_table().contains(&intf.id)
    }
}

struct Attached {
    intf: UsbInterface,
    bound: Option<Arc<dyn UsbDriver>>,
}

#[derive(Default)]
struct BusState {
    drivers: Vec<Arc<dyn UsbDriver>>,
    attached: Vec<Attached>,
}

/// The bus. Events are handled one at a time.
#[derive(Default)]
pub struct Bus {
    state: Mutex<BusState>,
}

impl Bus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a driver and probe any matching interfaces already attached.
    pub fn register(&self, driver: Arc<dyn UsbDriver>) -> Result<()> {
        let mut state = self.lock();
        if state.drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(Error::Busy(format!(
                "driver {} already registered",
                driver.name()
            )));
        }
        tracing::info!(driver = driver.name(), "bus: driver registered");

        for attached in state.attached.iter_mut().filter(|a| a.bound.is_none()) {
            if driver.matches(&attached.intf) {
                match driver.probe(&attached.intf) {
                    Ok(()) => attached.bound = Some(Arc::clone(&driver)),
                    Err(e) => {
                        tracing::error!(driver = driver.name(), error = %e, "bus: probe failed")
                    }
                }
            }
        }
        state.drivers.push(driver);
        Ok(())
    }

    /// Remove a driver, disconnecting every interface it bound.
    pub fn deregister(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .drivers
            .iter()
            .position(|d| d.name() == name)
            .ok_or_else(|| Error::Invalid(format!("driver {} not registered", name)))?;
        let driver = state.drivers.remove(index);

        for attached in state.attached.iter_mut() {
            let bound_here = attached
                .bound
                .as_ref()
                .is_some_and(|d| d.name() == name);
            if bound_here {
                driver.disconnect(&attached.intf);
                attached.bound = None;
            }
        }
        tracing::info!(driver = name, "bus: driver deregistered");
        Ok(())
    }

    /// A device interface appeared.
    ///
    /// The first driver whose id table matches is probed. If the probe
    /// fails the interface stays attached but unbound, and the probe error
    /// is returned.
    pub fn attach(&self, intf: UsbInterface) -> Result<()> {
        let mut state = self.lock();
        if state.attached.iter().any(|a| a.intf.port == intf.port) {
            return Err(Error::Busy(format!("port {:?} already attached", intf.port)));
        }
        tracing::info!(id = %intf.id, port = ?intf.port, "bus: device attached");

        let driver = state.drivers.iter().find(|d| d.matches(&intf)).cloned();
        let mut attached = Attached { intf, bound: None };
        let result = match driver {
            Some(driver) => match driver.probe(&attached.intf) {
                Ok(()) => {
                    attached.bound = Some(driver);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(driver = driver.name(), error = %e, "bus: probe failed");
                    Err(e)
                }
            },
            None => Ok(()),
        };
        state.attached.push(attached);
        result
    }

    /// A device interface went away.
    pub fn detach(&self, port: PortId) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .attached
            .iter()
            .position(|a| a.intf.port == port)
            .ok_or_else(|| Error::Invalid(format!("nothing attached at {:?}", port)))?;
        let attached = state.attached.remove(index);
        tracing::info!(id = %attached.intf.id, port = ?port, "bus: device detached");

        if let Some(driver) = attached.bound {
            driver.disconnect(&attached.intf);
        }
        Ok(())
    }

    /// Interfaces currently attached.
    pub fn attached(&self) -> Vec<UsbInterface> {
        self.lock().attached.iter().map(|a| a.intf.clone()).collect()
    }

    /// Name of the driver bound at `port`, if any.
    pub fn bound_driver(&self, port: PortId) -> Option<String> {
        self.lock()
            .attached
            .iter()
            .find(|a| a.intf.port == port)
            .and_then(|a| a.bound.as_ref().map(|d| d.name().to_string()))
    }

    /// Dispatch events until the sending side hangs up.
    pub fn run(&self, events: Receiver<BusEvent>) {
        for event in events {
            let result = match event {
                BusEvent::Attach(intf) => self.attach(intf),
                BusEvent::Detach(port) => self.detach(port),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "bus: event not handled cleanly");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
