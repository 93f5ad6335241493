//! Loading gate configuration from disk.

use int_stack::config::{GateConfig, TokenIdentity, DS4_V1};
use int_stack::gate::{Bus, DevFs, PresenceState, UsbInterface};
use int_stack::{Error, IntStackModule};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, json: &str) -> std::path::PathBuf {
    let path = dir.path().join("int_stack.json");
    fs::write(&path, json).expect("Failed to write config");
    path
}

#[test]
fn test_load_custom_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        r#"{
            "device_name": "usb_stack",
            "node_dir": "/run/dev",
            "default_capacity": 2,
            "identities": [ { "vendor_id": 4660, "product_id": 22136 } ]
        }"#,
    );

    let config = GateConfig::load(&path).expect("Failed to load config");
    assert_eq!(config.node_path(), Path::new("/run/dev/usb_stack"));
    assert_eq!(config.identities, vec![TokenIdentity::new(0x1234, 0x5678)]);

    let devfs = DevFs::new("/");
    let bus = Bus::new();
    let module = IntStackModule::load(config, devfs.clone(), bus.clone()).unwrap();

    // The default identities no longer match
    bus.attach(UsbInterface::new(1, 1, DS4_V1)).unwrap();
    assert_eq!(module.state(), PresenceState::Absent);

    bus.attach(UsbInterface::new(1, 2, TokenIdentity::new(0x1234, 0x5678)))
        .unwrap();
    assert!(!devfs.exists(Path::new("/dev/usb_stack")));
    let handle = devfs.open(&module.node_path()).unwrap();
    handle.write(&1i32.to_ne_bytes()).unwrap();
    handle.write(&2i32.to_ne_bytes()).unwrap();
    assert!(matches!(
        handle.write(&3i32.to_ne_bytes()),
        Err(Error::OutOfRange)
    ));
}

#[test]
fn test_node_dir_outside_devfs_refuses_token() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, r#"{ "node_dir": "/run/dev" }"#);
    let config = GateConfig::load(&path).expect("Failed to load config");

    let devfs = DevFs::new("/dev");
    let bus = Bus::new();
    let module = IntStackModule::load(config, devfs.clone(), bus.clone()).unwrap();

    let err = bus.attach(UsbInterface::new(1, 2, DS4_V1)).unwrap_err();
    assert!(matches!(err, Error::BusRegistration(_)));
    assert_eq!(module.state(), PresenceState::Absent);
    assert!(!devfs.exists(Path::new("/dev/int_stack")));
    assert_eq!(devfs.counts(), (0, 0, 0));
}

#[test]
fn test_load_rejects_invalid() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let path = write_config(&dir, r#"{ "default_capacity": 0 }"#);
    assert!(matches!(GateConfig::load(&path), Err(Error::Config(_))));

    let path = write_config(&dir, "not json");
    assert!(matches!(GateConfig::load(&path), Err(Error::Config(_))));

    let missing = dir.path().join("missing.json");
    assert!(matches!(GateConfig::load(&missing), Err(Error::Io(_))));
}
