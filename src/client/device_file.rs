//! Client access to a real device node through read/write/ioctl.

use crate::client::{Command, StackEndpoint};
use crate::config::ELEMENT_SIZE;
use crate::device::SET_CAPACITY;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// An open device node.
pub struct DeviceFile {
    file: File,
}

impl DeviceFile {
    /// Open `path` with the access mode `command` needs: write-only for
    /// push, read-only for pop and unwind, read-write for set-size.
    pub fn open_for(path: &Path, command: &Command) -> Result<Self> {
        let mut options = OpenOptions::new();
        match command {
            Command::Push(_) => options.write(true),
            Command::Pop | Command::Unwind => options.read(true),
            Command::SetSize(_) => options.read(true).write(true),
        };
        let file = options.open(path)?;
        Ok(Self { file })
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl StackEndpoint for DeviceFile {
    fn push(&mut self, value: i32) -> Result<()> {
        let written = self
            .file
            .write(&value.to_ne_bytes())
            .map_err(Error::from_io)?;
        if written != ELEMENT_SIZE {
            return Err(Error::Invalid(format!("short write of {} bytes", written)));
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<i32>> {
        let mut buf = [0u8; ELEMENT_SIZE];
        match self.file.read(&mut buf).map_err(Error::from_io)? {
            0 => Ok(None),
            ELEMENT_SIZE => Ok(Some(i32::from_ne_bytes(buf))),
            n => Err(Error::Invalid(format!("short read of {} bytes", n))),
        }
    }

    fn set_capacity(&mut self, capacity: u32) -> Result<()> {
        let arg: u32 = capacity;
        // SAFETY: the fd is open for the lifetime of `self.file` and the
        // argument points to a live u32, which is what SET_CAPACITY reads.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                SET_CAPACITY as _,
                &arg as *const u32,
            )
        };
        if ret < 0 {
            return Err(Error::from_ioctl(
                std::io::Error::last_os_error(),
                SET_CAPACITY,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempfile;

    #[test]
    fn test_push_writes_native_bytes() {
        let mut file = tempfile().unwrap();
        let mut endpoint = DeviceFile::from_file(file.try_clone().unwrap());
        endpoint.push(0x0102_0304).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut raw = Vec::new();
        file.read_to_end(&mut raw).unwrap();
        assert_eq!(raw, 0x0102_0304i32.to_ne_bytes());
    }

    #[test]
    fn test_pop_reads_until_eof() {
        let mut file = tempfile().unwrap();
        file.write_all(&(-7i32).to_ne_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut endpoint = DeviceFile::from_file(file);
        assert_eq!(endpoint.pop().unwrap(), Some(-7));
        assert_eq!(endpoint.pop().unwrap(), None);
    }

    #[test]
    fn test_ioctl_on_regular_file_fails() {
        let mut endpoint = DeviceFile::from_file(tempfile().unwrap());
        assert!(matches!(
            endpoint.set_capacity(5),
            Err(Error::NotSupported(SET_CAPACITY))
        ));
    }

    #[test]
    fn test_open_missing_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int_stack");
        assert!(DeviceFile::open_for(&path, &Command::Pop).is_err());
    }
}
