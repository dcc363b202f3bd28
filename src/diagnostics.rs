//! Read-only session diagnostics, for hosts that want to log or display
//! connection quality. Grounded on the teacher's `network::network_stats`
//! (`NetworkStats { network, timesync }`), reshaped around this core's
//! `Device`/`TimeSync` fields. Unlike the wire format, there's no fixed
//! byte layout to honor here, so these structs use `serde` the way the
//! teacher does for everything that isn't a hot-path datagram.

use serde::{Deserialize, Serialize};

use crate::device::DeviceRole;
use crate::Frame;

/// A snapshot of one device's synchronization state, suitable for
/// serializing into a log line or a debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub device_id: usize,
    pub role: DeviceRoleStats,
    /// The highest frame this device has acknowledged. `NULL_FRAME` if
    /// nothing has been heard from it yet.
    pub remote_frame: Frame,
    /// `local_frame_at_send − frame_sent` as of the last input message from
    /// this device.
    pub remote_advantage: i32,
    pub running: bool,
}

/// A serde-friendly mirror of [`DeviceRole`] — kept separate so the wire-
/// adjacent `DeviceRole` itself stays free of derive bloat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRoleStats {
    Local,
    Remote,
}

impl From<DeviceRole> for DeviceRoleStats {
    fn from(role: DeviceRole) -> Self {
        match role {
            DeviceRole::Local => DeviceRoleStats::Local,
            DeviceRole::Remote => DeviceRoleStats::Remote,
        }
    }
}
