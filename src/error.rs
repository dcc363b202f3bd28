use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::Frame;

/// This enum contains all fatal error conditions this library can return. Most
/// API functions that can fail return a [`Result<_, SessionError>`].
///
/// Transport-level oddities — malformed datagrams, datagrams from an
/// unregistered device, duplicate acks, out-of-order input batches — are
/// *not* represented here. The wire protocol is designed to be idempotent
/// over its message set, so the session absorbs those silently rather than
/// surfacing an error.
///
/// [`Result<_, SessionError>`]: std::result::Result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionError {
    /// The caller supplied a byte slice whose length does not equal
    /// `player_count * size_per_player` for the operation being performed.
    SizeMismatch {
        /// The length the caller actually provided.
        actual: usize,
        /// The length that was required.
        expected: usize,
    },
    /// The caller tried to add local input to a remote device, or vice versa.
    WrongDeviceRole {
        /// The device the caller addressed.
        device_id: usize,
    },
    /// A state slot was requested for a frame outside the current rollback
    /// window.
    FrameOutOfWindow {
        /// The frame that was requested.
        frame: Frame,
    },
    /// A `Load` was issued for a frame whose slot has never been written.
    /// Indicates a scheduler bug in the core; the host cannot recover from
    /// this by retrying.
    MissingState {
        /// The frame whose slot was empty.
        frame: Frame,
    },
    /// The caller made an otherwise invalid request: a duplicate device id,
    /// starting a session twice, registering a second local device, and
    /// so on.
    InvalidRequest {
        /// Further detail on why the request was invalid.
        info: &'static str,
    },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SizeMismatch { actual, expected } => {
                write!(
                    f,
                    "input size mismatch: got {actual} bytes, expected {expected}"
                )
            }
            SessionError::WrongDeviceRole { device_id } => {
                write!(
                    f,
                    "device {device_id} does not have the role required for this operation"
                )
            }
            SessionError::FrameOutOfWindow { frame } => {
                write!(f, "frame {frame} is outside the current rollback window")
            }
            SessionError::MissingState { frame } => {
                write!(f, "no saved state for frame {frame}")
            }
            SessionError::InvalidRequest { info } => {
                write!(f, "invalid request: {info}")
            }
        }
    }
}

impl Error for SessionError {}
