//! ADB (Android Debug Bridge) module for device interaction.

mod connection;
mod device;
pub mod input;
mod screenshot;

pub use connection::{ADBConnection, AdbError, ConnectionType, DeviceInfo};
pub use device::{parse_focused_package, AdbDevice, DEFAULT_SCREEN_SIZE};
pub use screenshot::process_screenshot;
