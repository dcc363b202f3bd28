use crate::device::{Device, DeviceRole};
use crate::{Frame, INITIAL_FRAME, NULL_FRAME};

/// Tunable thresholds governing the advantage-based stall decision in
/// [`TimeSync::is_time_synced`]. Exposed as configuration rather than
/// hardcoded, per the source's own recommendation (Open Question 3): the
/// precise thresholds were never asserted in the original tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncConfig {
    /// A peer must be at least this many frames ahead of its remote peers
    /// before a stall is even considered.
    pub min_frame_advantage: i32,
    /// How much further ahead than the slowest remote peer's advantage this
    /// peer must be before it stalls.
    pub frame_advantage_difference: i32,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            min_frame_advantage: 3,
            frame_advantage_difference: 2,
        }
    }
}

/// Tracks the clock state described in `spec.md` §3: `local_frame`,
/// `remote_frame`, and `sync_frame`, plus the derived `local_advantage`.
///
/// `TimeSync` itself does not know how to compute `sync_frame` — that
/// requires walking each device's input queue, which only the Sync Engine
/// has access to — so `set_sync_frame` is a plain setter the engine calls
/// once it has swept the prediction window.
#[derive(Debug, Clone)]
pub(crate) struct TimeSync {
    config: TimeSyncConfig,
    local_frame: Frame,
    remote_frame: Frame,
    sync_frame: Frame,
}

impl TimeSync {
    /// `local_frame` starts at `INITIAL_FRAME` — frame 0 is whatever state
    /// the host constructed before the session started ticking, and the
    /// engine's very first `advance` call is responsible for asking the
    /// host to snapshot it. `remote_frame` and `sync_frame` start at
    /// `NULL_FRAME`: nothing has been heard from a peer, and nothing has
    /// been verified, yet.
    pub(crate) fn new(config: TimeSyncConfig) -> Self {
        Self {
            config,
            local_frame: INITIAL_FRAME,
            remote_frame: NULL_FRAME,
            sync_frame: NULL_FRAME,
        }
    }

    pub(crate) fn local_frame(&self) -> Frame {
        self.local_frame
    }

    pub(crate) fn set_local_frame(&mut self, frame: Frame) {
        self.local_frame = frame;
    }

    pub(crate) fn remote_frame(&self) -> Frame {
        self.remote_frame
    }

    pub(crate) fn sync_frame(&self) -> Frame {
        self.sync_frame
    }

    pub(crate) fn set_sync_frame(&mut self, frame: Frame) {
        self.sync_frame = frame;
    }

    /// `local_frame − remote_frame`. Zero while either clock hasn't ticked
    /// yet.
    pub(crate) fn local_advantage(&self) -> i32 {
        if self.local_frame == NULL_FRAME || self.remote_frame == NULL_FRAME {
            0
        } else {
            self.local_frame - self.remote_frame
        }
    }

    /// Recomputes `remote_frame` as the minimum over all remote devices'
    /// last-acknowledged frame. A session with no remote devices yet leaves
    /// `remote_frame` at `NULL_FRAME`.
    pub(crate) fn recompute_remote_frame(&mut self, devices: &[Device]) {
        self.remote_frame = devices
            .iter()
            .filter(|d| d.role == DeviceRole::Remote)
            .map(|d| d.remote_frame)
            .min()
            .unwrap_or(NULL_FRAME);
    }

    /// Returns true when this peer should advance its local frame this
    /// tick. Returns false (stall one frame) when the local peer is running
    /// far enough ahead of the slowest remote peer that continuing would
    /// widen the gap further: `local_advantage ≥ min_frame_advantage` and
    /// `local_advantage − remote_advantage_used ≥ frame_advantage_difference`.
    pub(crate) fn is_time_synced(&self, devices: &[Device]) -> bool {
        let remote_advantage_used = devices
            .iter()
            .filter(|d| d.role == DeviceRole::Remote)
            .map(|d| d.remote_advantage)
            .max();

        let Some(remote_advantage_used) = remote_advantage_used else {
            return true;
        };

        let local_advantage = self.local_advantage();
        let should_stall = local_advantage >= self.config.min_frame_advantage
            && local_advantage - remote_advantage_used >= self.config.frame_advantage_difference;

        !should_stall
    }

    /// True iff there is a verified prefix shorter than `local_frame` that a
    /// rollback would replay forward from. By construction `sync_frame`
    /// already reflects the highest frame up to `min(local_frame,
    /// remote_frame)` whose predictions all checked out, so this reduces to
    /// a simple comparison — except while `sync_frame` is still `NULL_FRAME`
    /// (no remote device has confirmed anything yet), which means nothing
    /// has been verified one way or the other, not that everything already
    /// simulated is wrong.
    pub(crate) fn should_rollback(&self) -> bool {
        self.sync_frame != NULL_FRAME && self.sync_frame < self.local_frame
    }
}
