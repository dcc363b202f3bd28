//! # rollnet-core
//!
//! A peer-to-peer rollback network synchronization engine for real-time
//! multiplayer games, in 100% safe Rust.
//!
//! The core owns four tightly coupled subsystems: the [`time_sync`] clock
//! and advantage tracker, the per-device [`input_queue`], the
//! [`sync_engine`] that turns all of it into a per-tick list of
//! [`Directive`]s, and the [`handshake`] protocol that gates a device's
//! promotion to `Running`. The host fulfills directives (stepping its
//! simulation, saving/loading opaque state blobs) and otherwise drives the
//! session via [`Session`](session::Session).

#![forbid(unsafe_code)]

pub use device::{DeviceAdapter, DeviceRole};
pub use diagnostics::{DeviceRoleStats, DeviceStats};
pub use error::SessionError;
pub use frame_info::GameInput;
pub use session::{Session, SessionBuilder};
pub use state_storage::StateHandle;

pub(crate) mod device;
pub(crate) mod diagnostics;
pub(crate) mod error;
pub(crate) mod frame_info;
pub(crate) mod handshake;
pub(crate) mod input_queue;
pub(crate) mod message;
pub(crate) mod session;
pub(crate) mod state_storage;
pub(crate) mod sync_engine;
pub(crate) mod time_sync;

#[cfg(test)]
pub(crate) mod test_support;

// #############
// # CONSTANTS #
// #############

/// -1 represents no frame / an invalid frame.
pub const NULL_FRAME: i32 = -1;

/// The first frame of any session.
pub const INITIAL_FRAME: i32 = 0;

/// A frame number. `NULL_FRAME` is the sentinel for "no frame".
pub type Frame = i32;

/// Default ring-buffer depth for both [`state_storage::StateStorage`] and
/// the redundancy margin baked into each device's [`input_queue::InputQueue`].
pub const MAX_ROLLBACK_FRAMES: usize = 8;

/// Default width of the trailing window of frames redundantly resent in
/// each `InputBatch`, to mask packet loss without retransmission.
pub const INPUT_REDUNDANCY_FRAMES: usize = 8;

/// Default [`time_sync::TimeSyncConfig::min_frame_advantage`].
pub const MIN_FRAME_ADVANTAGE: i32 = 3;

/// Default [`time_sync::TimeSyncConfig::frame_advantage_difference`].
pub const FRAME_ADVANTAGE_DIFFERENCE: i32 = 2;

// #############
// #   ENUMS   #
// #############

/// One instruction the Sync Engine hands back to the host after a tick.
/// Handling every directive in order is mandatory; the host never chooses
/// to skip one.
#[derive(Debug, Clone)]
pub enum Directive {
    /// Serialize the current game state and write it into `handle`. The
    /// `Frame` is a sanity check — the state saved should be from that
    /// frame.
    Save(Frame, StateHandle),
    /// Restore game state from `handle`. The `Frame` is a sanity check —
    /// the state restored should be from that frame.
    Load(Frame, StateHandle),
    /// Step the simulation forward one frame using the combined input
    /// buffer (each device's payload concatenated in device-id order).
    Advance(Frame, Vec<u8>),
}
