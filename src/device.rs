use crate::handshake::HandshakeState;
use crate::{Frame, NULL_FRAME};

/// The transport contract the core consumes, per `spec.md` §6. An adapter
/// wraps whatever unreliable datagram channel the host provides (UDP
/// socket, WebRTC data channel, in-memory loopback for tests) behind two
/// non-blocking operations.
///
/// Implementations must never block `send` or `poll` — the core's `poll`
/// tick assumes both return immediately.
pub trait DeviceAdapter {
    /// Best-effort, unreliable send. No delivery guarantee, no return value.
    fn send(&mut self, bytes: Vec<u8>);
    /// Returns every datagram buffered since the last call, in arrival
    /// order.
    fn poll(&mut self) -> Vec<Vec<u8>>;
}

/// Whether a device represents this process (`Local`) or a peer (`Remote`).
/// Exactly one device per session has role `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Local,
    Remote,
}

/// A peer descriptor: identity, role, handshake progress, and the transport
/// used to reach it. Registered at session construction and held for the
/// session's lifetime.
pub(crate) struct Device {
    pub(crate) id: usize,
    pub(crate) role: DeviceRole,
    pub(crate) player_count: usize,
    /// The highest frame this device has acknowledged (remote devices) or
    /// is irrelevant for (the local device, which never updates this).
    pub(crate) remote_frame: Frame,
    /// `local_frame_at_send − frame_sent`, refreshed on every input message
    /// from this device. Meaningless for the local device.
    pub(crate) remote_advantage: i32,
    pub(crate) handshake_state: HandshakeState,
    pub(crate) adapter: Box<dyn DeviceAdapter>,
}

impl Device {
    pub(crate) fn new(
        id: usize,
        role: DeviceRole,
        player_count: usize,
        adapter: Box<dyn DeviceAdapter>,
    ) -> Self {
        Self {
            id,
            role,
            player_count,
            remote_frame: NULL_FRAME,
            remote_advantage: 0,
            handshake_state: HandshakeState::new(),
            adapter,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.handshake_state, HandshakeState::Running)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("player_count", &self.player_count)
            .field("remote_frame", &self.remote_frame)
            .field("remote_advantage", &self.remote_advantage)
            .field("handshake_state", &self.handshake_state)
            .finish_non_exhaustive()
    }
}
