//! Device I/O boundary.
//!
//! The engine never touches the serial connection itself; it only sees a
//! boolean connected flag. A [`DeviceLink`] implementation performs the
//! actual handshake and drives `SelectionEngine::set_connected`.

use tracing::{debug, info};

use crate::models::DeviceInfo;

/// Contract for the collaborator that owns the physical connection.
pub trait DeviceLink {
    /// Opens the connection and reports device metadata.
    fn request_connection(&mut self) -> Result<DeviceInfo, String>;

    /// Closes the connection. Safe to call when not connected.
    fn close(&mut self);
}

/// Placeholder device link for the showcase. It opens nothing and echoes
/// the selected project's chip family back as the detected chip type.
///
/// A production link would speak the bootloader protocol (esptool-style
/// for ESP32/ESP8266, picoboot for RP2040) and read the real chip id,
/// MAC address and flash size.
#[derive(Debug, Default)]
pub struct StubSerialLink {
    chip_hint: Option<String>,
    open: bool,
}

impl StubSerialLink {
    pub fn new(chip_hint: Option<String>) -> Self {
        Self {
            chip_hint,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl DeviceLink for StubSerialLink {
    fn request_connection(&mut self) -> Result<DeviceInfo, String> {
        self.open = true;
        info!("Device connected successfully (stub link)");
        Ok(DeviceInfo {
            chip_type: self
                .chip_hint
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            mac_address: "N/A (detection not implemented)".to_string(),
            flash_size: "N/A (detection not implemented)".to_string(),
        })
    }

    fn close(&mut self) {
        if self.open {
            debug!("Device disconnected");
        }
        self.open = false;
    }
}
