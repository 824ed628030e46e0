//! ADB process invocation and device discovery.

use std::process::{Command, Output};
use thiserror::Error;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl DeviceInfo {
    /// Whether the device is online and authorized.
    pub fn is_ready(&self) -> bool {
        self.status == "device"
    }
}

/// ADB connection errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("No ready device found")]
    NoDevice,
}

/// Manages the ADB server side: connecting remote devices and listing them.
///
/// # Example
/// ```rust,no_run
/// use phone_pilot::adb::ADBConnection;
///
/// let conn = ADBConnection::new();
/// let devices = conn.list_devices();
/// ```
pub struct ADBConnection {
    adb_path: String,
}

impl Default for ADBConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ADBConnection {
    /// Create a connection manager using `adb` from `PATH`.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
        }
    }

    /// Create a connection manager with a custom ADB binary.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    /// Connect to a remote device via TCP/IP, defaulting to port 5555.
    pub fn connect(&self, address: &str) -> Result<String, AdbError> {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:5555", address)
        };

        let output = Command::new(&self.adb_path)
            .args(["connect", &address])
            .output()
            .map_err(|e| AdbError::Connection(e.to_string()))?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        // "unable to connect" also contains "connect", so match on "connected"
        if combined.to_lowercase().contains("connected to")
            || combined.to_lowercase().contains("already connected")
        {
            Ok(format!("Connected to {}", address))
        } else {
            Err(AdbError::Connection(combined.trim().to_string()))
        }
    }

    /// List all devices known to the ADB server.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = Command::new(&self.adb_path)
            .args(["devices", "-l"])
            .output()
            .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// First device in the `device` state.
    pub fn first_ready_device(&self) -> Result<DeviceInfo, AdbError> {
        self.list_devices()?
            .into_iter()
            .find(DeviceInfo::is_ready)
            .ok_or(AdbError::NoDevice)
    }
}

/// Parse the output of `adb devices -l`.
fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let device_id = parts[0].to_string();
            let connection_type = if device_id.contains(':') {
                ConnectionType::Remote
            } else {
                ConnectionType::Usb
            };
            let model = parts
                .iter()
                .find(|p| p.starts_with("model:"))
                .map(|m| m.trim_start_matches("model:").to_string());

            Some(DeviceInfo {
                device_id,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(adb_path: &str, device_id: Option<&str>) -> Vec<String> {
    match device_id {
        Some(id) => vec![adb_path.to_string(), "-s".to_string(), id.to_string()],
        None => vec![adb_path.to_string()],
    }
}

/// Run an ADB command against a device, logging spawn failures.
pub(crate) fn run_adb(adb_path: &str, device_id: Option<&str>, args: &[&str]) -> Option<Output> {
    let prefix = get_adb_prefix(adb_path, device_id);
    match Command::new(&prefix[0]).args(&prefix[1..]).args(args).output() {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::warn!("adb {:?} failed to start: {}", args, e);
            None
        }
    }
}
