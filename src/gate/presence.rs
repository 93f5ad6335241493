//! Token-gated publication of the stack device node.

use crate::config::{GateConfig, TokenIdentity, DEVICE_MINOR, DRIVER_NAME};
use crate::device::StackDevice;
use crate::error::{Error, Result};
use crate::gate::bus::{PortId, UsbDriver, UsbInterface};
use crate::gate::devfs::{ClassId, DevT, NodeRegistrar};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Whether a token is currently bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Absent,
    Present(TokenIdentity),
}

/// Resources held while a token is present.
#[derive(Debug)]
struct Binding {
    port: PortId,
    id: TokenIdentity,
    major: u32,
    class: ClassId,
    node: PathBuf,
}

/// Bus driver that publishes the device node while a recognized token is
/// attached.
///
/// Only one token is bound at a time; further tokens are refused until the
/// bound one leaves. The stack itself is not touched here: it is built on
/// first open and freed when the subsystem unloads.
pub struct PresenceGate {
    config: GateConfig,
    device: Arc<StackDevice>,
    registrar: Arc<dyn NodeRegistrar>,
    binding: Mutex<Option<Binding>>,
}

impl PresenceGate {
    pub fn new(
        config: GateConfig,
        device: Arc<StackDevice>,
        registrar: Arc<dyn NodeRegistrar>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            device,
            registrar,
            binding: Mutex::new(None),
        })
    }

    pub fn state(&self) -> PresenceState {
        match self.lock().as_ref() {
            Some(binding) => PresenceState::Present(binding.id),
            None => PresenceState::Absent,
        }
    }

    /// Path of the node while present.
    pub fn node_path(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|b| b.node.clone())
    }

    /// Claim a major, create the class, create the node; unwind in reverse
    /// on failure.
    fn publish(&self, intf: &UsbInterface) -> Result<Binding> {
        let name = self.config.device_name.as_str();

        let major = self
            .registrar
            .register_chrdev(name, Arc::clone(&self.device))
            .map_err(registration("chrdev"))?;

        let class = match self.registrar.class_create(name) {
            Ok(class) => class,
            Err(e) => {
                self.registrar.unregister_chrdev(major, name);
                return Err(registration("class")(e));
            }
        };

        let devt = DevT::new(major, DEVICE_MINOR);
        let node = match self
            .registrar
            .device_create(class, devt, &self.config.node_dir, name)
        {
            Ok(node) => node,
            Err(e) => {
                self.registrar.class_destroy(class);
                self.registrar.unregister_chrdev(major, name);
                return Err(registration("node")(e));
            }
        };

        tracing::info!(node = %node.display(), major, "int_stack: created device node");
        Ok(Binding {
            port: intf.port,
            id: intf.id,
            major,
            class,
            node,
        })
    }

    fn unpublish(&self, binding: Binding) {
        let name = self.config.device_name.as_str();
        self.registrar
            .device_destroy(binding.class, DevT::new(binding.major, DEVICE_MINOR));
        self.registrar.class_destroy(binding.class);
        self.registrar.unregister_chrdev(binding.major, name);
        tracing::info!(node = %binding.node.display(), "int_stack: removed device node");
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsbDriver for PresenceGate {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn id_table(&self) -> &[TokenIdentity] {
        &self.config.identities
    }

    fn probe(&self, intf: &UsbInterface) -> Result<()> {
        tracing::info!(
            vid = format_args!("{:04x}", intf.id.vendor_id),
            pid = format_args!("{:04x}", intf.id.product_id),
            ifnum = intf.port.interface,
            "int_stack_usbkey: token found"
        );

        let mut binding = self.lock();
        if let Some(current) = binding.as_ref() {
            return Err(Error::Busy(format!(
                "token {} already bound at {:?}",
                current.id, current.port
            )));
        }

        match self.publish(intf) {
            Ok(published) => {
                *binding = Some(published);
                tracing::info!(id = %intf.id, "int_stack_usbkey: token plugged");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "int_stack_usbkey: failed to create char device");
                Err(e)
            }
        }
    }

    fn disconnect(&self, intf: &UsbInterface) {
        let mut binding = self.lock();
        let bound_here = binding.as_ref().is_some_and(|b| b.port == intf.port);
        if !bound_here {
            return;
        }
        if let Some(current) = binding.take() {
            self.unpublish(current);
        }
        tracing::info!(id = %intf.id, "int_stack_usbkey: token removed");
    }
}

fn registration(stage: &'static str) -> impl Fn(Error) -> Error {
    move |e| match e {
        Error::BusRegistration(msg) => Error::BusRegistration(msg),
        other => Error::BusRegistration(format!("{}: {}", stage, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DS4_V1, DS4_V2};
    use crate::gate::devfs::{DevFs, RegistrationStage};
    use std::path::Path;

    fn gate() -> (Arc<PresenceGate>, Arc<DevFs>, Arc<StackDevice>) {
        let devfs = DevFs::new("/dev");
        let device = StackDevice::new(10);
        let gate = PresenceGate::new(GateConfig::default(), device.clone(), devfs.clone());
        (gate, devfs, device)
    }

    #[test]
    fn test_probe_publishes_node() {
        let (gate, devfs, device) = gate();
        assert_eq!(gate.state(), PresenceState::Absent);

        gate.probe(&UsbInterface::new(1, 2, DS4_V1)).unwrap();
        assert_eq!(gate.state(), PresenceState::Present(DS4_V1));
        assert!(devfs.exists(Path::new("/dev/int_stack")));
        assert_eq!(gate.node_path(), Some(PathBuf::from("/dev/int_stack")));
        assert!(!device.is_instantiated());
    }

    #[test]
    fn test_disconnect_removes_everything() {
        let (gate, devfs, _) = gate();
        let intf = UsbInterface::new(1, 2, DS4_V2);
        gate.probe(&intf).unwrap();
        gate.disconnect(&intf);

        assert_eq!(gate.state(), PresenceState::Absent);
        assert_eq!(devfs.counts(), (0, 0, 0));
    }

    #[test]
    fn test_second_token_refused() {
        let (gate, devfs, _) = gate();
        let first = UsbInterface::new(1, 2, DS4_V1);
        let second = UsbInterface::new(1, 3, DS4_V2);
        gate.probe(&first).unwrap();

        assert!(matches!(gate.probe(&second), Err(Error::Busy(_))));
        gate.disconnect(&second);
        assert_eq!(gate.state(), PresenceState::Present(DS4_V1));
        assert_eq!(devfs.counts(), (1, 1, 1));
    }

    #[test]
    fn test_node_created_in_configured_dir() {
        let devfs = DevFs::new("/");
        let config = GateConfig {
            node_dir: PathBuf::from("/run/dev"),
            ..GateConfig::default()
        };
        let gate = PresenceGate::new(config.clone(), StackDevice::new(10), devfs.clone());

        gate.probe(&UsbInterface::new(1, 2, DS4_V1)).unwrap();
        assert_eq!(gate.node_path(), Some(config.node_path()));
        assert!(devfs.exists(&config.node_path()));
        assert!(!devfs.exists(Path::new("/dev/int_stack")));
    }

    #[test]
    fn test_node_dir_outside_namespace_unwinds() {
        let devfs = DevFs::new("/dev");
        let config = GateConfig {
            node_dir: PathBuf::from("/run/dev"),
            ..GateConfig::default()
        };
        let gate = PresenceGate::new(config, StackDevice::new(10), devfs.clone());

        let err = gate.probe(&UsbInterface::new(1, 2, DS4_V1)).unwrap_err();
        assert!(matches!(err, Error::BusRegistration(_)));
        assert_eq!(gate.state(), PresenceState::Absent);
        assert_eq!(devfs.counts(), (0, 0, 0));
    }

    #[test]
    fn test_failures_unwind() {
        for stage in [
            RegistrationStage::Chrdev,
            RegistrationStage::Class,
            RegistrationStage::Node,
        ] {
            let (gate, devfs, _) = gate();
            devfs.fail_next(stage);

            let err = gate.probe(&UsbInterface::new(1, 2, DS4_V1)).unwrap_err();
            assert!(matches!(err, Error::BusRegistration(_)), "{:?}", stage);
            assert_eq!(gate.state(), PresenceState::Absent);
            assert_eq!(devfs.counts(), (0, 0, 0), "{:?}", stage);
        }
    }
}
