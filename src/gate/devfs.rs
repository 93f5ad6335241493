//! Device namespace: chrdev regions, device classes and nodes.

use crate::device::{StackDevice, StackHandle};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Highest major handed out by dynamic allocation.
const DYNAMIC_MAJOR_MAX: u32 = 254;

/// Lowest major handed out by dynamic allocation.
const DYNAMIC_MAJOR_MIN: u32 = 234;

/// A device number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevT {
    pub major: u32,
    pub minor: u32,
}

impl DevT {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Handle on a registered device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

/// Step of node publication, used to inject registration faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStage {
    Chrdev,
    Class,
    Node,
}

/// Where device nodes are registered.
///
/// Mirrors the three steps a character driver takes to publish a node:
/// claim a major, create a class, create the node under that class.
pub trait NodeRegistrar: Send + Sync {
    /// Claim a dynamically allocated major and bind `device` to it.
    fn register_chrdev(&self, name: &str, device: Arc<StackDevice>) -> Result<u32>;

    fn unregister_chrdev(&self, major: u32, name: &str);

    fn class_create(&self, name: &str) -> Result<ClassId>;

    fn class_destroy(&self, class: ClassId);

    /// Create the node `dir/name` and return its path.
    fn device_create(
        &self,
        class: ClassId,
        devt: DevT,
        dir: &Path,
        name: &str,
    ) -> Result<PathBuf>;

    fn device_destroy(&self, class: ClassId, devt: DevT);
}

struct Chrdev {
    name: String,
    device: Arc<StackDevice>,
}

struct Node {
    class: ClassId,
    devt: DevT,
}

#[derive(Default)]
struct DevFsState {
    chrdevs: HashMap<u32, Chrdev>,
    classes: HashMap<ClassId, String>,
    next_class: u32,
    nodes: HashMap<PathBuf, Node>,
    faults: HashSet<RegistrationStage>,
}

/// In-memory device namespace.
///
/// Nodes are resolved to the device bound to their major at open time, so
/// an open on a removed node fails while handles already open keep working.
pub struct DevFs {
    root: PathBuf,
    state: Mutex<DevFsState>,
}

impl DevFs {
    /// Namespace publishing nodes under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            state: Mutex::new(DevFsState::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the node at `path`.
    pub fn open(&self, path: &Path) -> Result<StackHandle> {
        let device = {
            let state = self.lock();
            let node = state
                .nodes
                .get(path)
                .ok_or_else(|| Error::DeviceAbsent(path.to_path_buf()))?;
            let chrdev = state
                .chrdevs
                .get(&node.devt.major)
                .ok_or_else(|| Error::DeviceAbsent(path.to_path_buf()))?;
            Arc::clone(&chrdev.device)
        };
        device.open()
    }

    /// Whether a node exists at `path`.
    pub fn exists(&self, path: &Path) -> bool {
        self.lock().nodes.contains_key(path)
    }

    /// Device number of the node at `path`.
    pub fn devt(&self, path: &Path) -> Option<DevT> {
        self.lock().nodes.get(path).map(|n| n.devt)
    }

    /// Number of claimed majors, classes and nodes.
    pub fn counts(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (state.chrdevs.len(), state.classes.len(), state.nodes.len())
    }

    /// Make the next attempt at `stage` fail.
    pub fn fail_next(&self, stage: RegistrationStage) {
        self.lock().faults.insert(stage);
    }

    fn lock(&self) -> MutexGuard<'_, DevFsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DevFsState {
    fn injected(&mut self, stage: RegistrationStage) -> Result<()> {
        if self.faults.remove(&stage) {
            return Err(Error::BusRegistration(format!("{:?} registration failed", stage)));
        }
        Ok(())
    }
}

impl NodeRegistrar for DevFs {
    fn register_chrdev(&self, name: &str, device: Arc<StackDevice>) -> Result<u32> {
        let mut state = self.lock();
        state.injected(RegistrationStage::Chrdev)?;

        let major = (DYNAMIC_MAJOR_MIN..=DYNAMIC_MAJOR_MAX)
            .rev()
            .find(|m| !state.chrdevs.contains_key(m))
            .ok_or_else(|| Error::Busy("no free major number".to_string()))?;
        state.chrdevs.insert(
            major,
            Chrdev {
                name: name.to_string(),
                device,
            },
        );
        Ok(major)
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        let mut state = self.lock();
        let known = state.chrdevs.get(&major).is_some_and(|c| c.name == name);
        if known {
            state.chrdevs.remove(&major);
        } else {
            tracing::warn!(major, name, "devfs: unregister of unknown chrdev");
        }
    }

    fn class_create(&self, name: &str) -> Result<ClassId> {
        let mut state = self.lock();
        state.injected(RegistrationStage::Class)?;

        if state.classes.values().any(|c| c == name) {
            return Err(Error::Busy(format!("class {} exists", name)));
        }
        let id = ClassId(state.next_class);
        state.next_class += 1;
        state.classes.insert(id, name.to_string());
        Ok(id)
    }

    fn class_destroy(&self, class: ClassId) {
        let mut state = self.lock();
        state.classes.remove(&class);
        state.nodes.retain(|_, node| node.class != class);
    }

    fn device_create(
        &self,
        class: ClassId,
        devt: DevT,
        dir: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        let mut state = self.lock();
        state.injected(RegistrationStage::Node)?;

        if !state.classes.contains_key(&class) {
            return Err(Error::Invalid(format!("unknown class {:?}", class)));
        }
        if !dir.starts_with(&self.root) {
            return Err(Error::Invalid(format!(
                "{} is outside {}",
                dir.display(),
                self.root.display()
            )));
        }
        let path = dir.join(name);
        if state.nodes.contains_key(&path) {
            return Err(Error::Busy(format!("{} exists", path.display())));
        }
        state.nodes.insert(path.clone(), Node { class, devt });
        Ok(path)
    }

    fn device_destroy(&self, class: ClassId, devt: DevT) {
        self.lock()
            .nodes
            .retain(|_, node| !(node.class == class && node.devt == devt));
    }
}
