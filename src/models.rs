use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A simple cancel token for aborting a running flash sequence.
///
/// Cancellation is cooperative: the runner checks the token between
/// stages, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Device metadata reported by a device link after a successful
/// connection handshake.
///
/// The stub link fills this with placeholder values; a real serial
/// implementation would read the chip id, MAC and flash size from the
/// bootloader instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub chip_type: String,
    pub mac_address: String,
    pub flash_size: String,
}
