//! Subsystem controller: owns the stack device and the presence gate.

use crate::config::GateConfig;
use crate::device::StackDevice;
use crate::error::Result;
use crate::gate::{Bus, NodeRegistrar, PresenceGate, PresenceState, UsbDriver};
use std::path::PathBuf;
use std::sync::Arc;

/// The loaded subsystem.
///
/// Loading registers the presence gate with the bus; the node appears
/// when a token does. Unloading removes the gate, waits for every open
/// handle to be released and only then frees the stack.
pub struct IntStackModule {
    config: GateConfig,
    device: Arc<StackDevice>,
    gate: Arc<PresenceGate>,
    bus: Arc<Bus>,
}

impl IntStackModule {
    /// Load the subsystem onto `bus`, publishing nodes through `registrar`.
    pub fn load(
        config: GateConfig,
        registrar: Arc<dyn NodeRegistrar>,
        bus: Arc<Bus>,
    ) -> Result<Self> {
        config.validate()?;

        let device = StackDevice::new(config.default_capacity);
        let gate = PresenceGate::new(config.clone(), Arc::clone(&device), registrar);
        bus.register(Arc::clone(&gate) as Arc<dyn UsbDriver>)?;
        tracing::info!(
            identities = config.identities.len(),
            "int_stack: module loaded"
        );

        Ok(Self {
            config,
            device,
            gate,
            bus,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn state(&self) -> PresenceState {
        self.gate.state()
    }

    /// Path the node is published at while a token is present.
    pub fn node_path(&self) -> PathBuf {
        self.config.node_path()
    }

    pub fn device(&self) -> &Arc<StackDevice> {
        &self.device
    }

    /// Remove the gate, wait for open handles, free the stack.
    pub fn unload(self) -> Result<()> {
        self.bus.deregister(self.gate.name())?;
        self.device.drain();
        tracing::info!("int_stack: module unloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DS4_V1;
    use crate::gate::{DevFs, UsbInterface};
    use std::thread;
    use std::time::Duration;

    fn load() -> (IntStackModule, Arc<DevFs>, Arc<Bus>) {
        let devfs = DevFs::new("/dev");
        let bus = Bus::new();
        let module =
            IntStackModule::load(GateConfig::default(), devfs.clone(), bus.clone()).unwrap();
        (module, devfs, bus)
    }

    #[test]
    fn test_invalid_config_refused() {
        let config = GateConfig {
            identities: Vec::new(),
            ..GateConfig::default()
        };
        assert!(IntStackModule::load(config, DevFs::new("/dev"), Bus::new()).is_err());
    }

    #[test]
    fn test_unload_with_token_present_removes_node() {
        let (module, devfs, bus) = load();
        bus.attach(UsbInterface::new(1, 2, DS4_V1)).unwrap();
        let handle = devfs.open(&module.node_path()).unwrap();
        drop(handle);

        let device = Arc::clone(module.device());
        module.unload().unwrap();
        assert_eq!(devfs.counts(), (0, 0, 0));
        assert!(!device.is_instantiated());
    }

    #[test]
    fn test_unload_waits_for_handles() {
        let (module, devfs, bus) = load();
        let intf = UsbInterface::new(1, 2, DS4_V1);
        bus.attach(intf.clone()).unwrap();
        let handle = devfs.open(&module.node_path()).unwrap();
        bus.detach(intf.port).unwrap();

        let device = Arc::clone(module.device());
        let unloader = thread::spawn(move || module.unload());

        thread::sleep(Duration::from_millis(50));
        assert!(!unloader.is_finished());
        assert!(device.is_instantiated());

        handle.write(&7i32.to_ne_bytes()).unwrap();
        drop(handle);
        unloader.join().unwrap().unwrap();
        assert!(!device.is_instantiated());
    }

    #[test]
    fn test_unload_waits_for_handle_opened_while_waiting() {
        let (module, devfs, bus) = load();
        bus.attach(UsbInterface::new(1, 2, DS4_V1)).unwrap();
        let first = devfs.open(&module.node_path()).unwrap();

        let device = Arc::clone(module.device());
        let unloader = thread::spawn(move || module.unload());

        let second = device.open().unwrap();
        drop(first);
        thread::sleep(Duration::from_millis(50));
        assert!(!unloader.is_finished());

        drop(second);
        unloader.join().unwrap().unwrap();
        assert!(!device.is_instantiated());
        assert_eq!(device.pins(), 0);
    }
}
