use std::fmt;

/// Maximum number of ASCII bytes a device serial carries, not counting the
/// trailing NUL the wire representation reserves for it.
pub const SERIAL_CAPACITY: usize = 6;

/// A short alphanumeric device serial (at most [`SERIAL_CAPACITY`] bytes).
///
/// Stored NUL-padded inline so `Event` stays `Copy` and allocation-free.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceSerial {
    bytes: [u8; SERIAL_CAPACITY],
    len: u8,
}

/// The provided serial did not fit in [`SERIAL_CAPACITY`] bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device serial longer than {SERIAL_CAPACITY} bytes")]
pub struct SerialTooLong;

impl DeviceSerial {
    /// Build a serial from a short ASCII string, truncating silently past
    /// [`SERIAL_CAPACITY`] bytes only if `strict` is false; by default this
    /// rejects anything too long so callers notice a malformed serial
    /// rather than silently losing bytes.
    pub fn new(serial: &str) -> Result<Self, SerialTooLong> {
        if serial.len() > SERIAL_CAPACITY {
            return Err(SerialTooLong);
        }
        let mut bytes = [0u8; SERIAL_CAPACITY];
        bytes[..serial.len()].copy_from_slice(serial.as_bytes());
        Ok(Self {
            bytes,
            len: serial.len() as u8,
        })
    }

    /// Build a serial, truncating to [`SERIAL_CAPACITY`] bytes if needed.
    pub fn new_truncated(serial: &str) -> Self {
        let len = serial.len().min(SERIAL_CAPACITY);
        let mut bytes = [0u8; SERIAL_CAPACITY];
        bytes[..len].copy_from_slice(&serial.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceSerial").field(&self.as_str()).finish()
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
