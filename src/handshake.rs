//! Pre-run device verification, per `spec.md` §4.5. Each remote device
//! walks `Syncing → Synced → Running` before the Sync Engine will advance
//! frames against it.
//!
//! Grounded on the retransmission cadence of the teacher's
//! `network::udp_protocol` (`SYNC_RETRY_INTERVAL`), generalized from a
//! fixed-roundtrip-count handshake to the spec's always-ack, nonce-echo
//! protocol.

use instant::{Duration, Instant};

use crate::message::Message;

/// How often an unanswered `SyncRequest` is retransmitted while `Syncing`.
pub(crate) const SYNC_RETRY_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    /// Waiting for the peer to echo our nonce. `last_sent` is `None` until
    /// the first `SyncRequest` goes out.
    Syncing {
        nonce: u32,
        last_sent: Option<Instant>,
    },
    /// The peer has echoed our nonce; waiting for the session to promote
    /// every device to `Running` together.
    Synced { nonce: u32 },
    /// Verified and cleared to advance frames.
    Running,
}

impl HandshakeState {
    pub(crate) fn new() -> Self {
        HandshakeState::Syncing {
            nonce: rand::random(),
            last_sent: None,
        }
    }

    pub(crate) fn is_synced_or_running(&self) -> bool {
        !matches!(self, HandshakeState::Syncing { .. })
    }
}

/// If this device is `Syncing` and either has never sent a `SyncRequest` or
/// hasn't for at least `SYNC_RETRY_INTERVAL`, returns the request to send
/// and records the send time. Otherwise returns `None`.
pub(crate) fn poll_retransmit(state: &mut HandshakeState, now: Instant) -> Option<Message> {
    let HandshakeState::Syncing { nonce, last_sent } = state else {
        return None;
    };
    let due = match last_sent {
        Some(t) => *t + SYNC_RETRY_INTERVAL <= now,
        None => true,
    };
    if !due {
        return None;
    }
    *last_sent = Some(now);
    Some(Message::SyncRequest { nonce: *nonce })
}

/// A `SyncRequest` always gets a reply, regardless of this device's own
/// handshake progress (Open Question 1: always ack).
pub(crate) fn on_sync_request(incoming_nonce: u32) -> Message {
    Message::SyncReply {
        nonce: incoming_nonce,
    }
}

/// Advances `Syncing → Synced` if `incoming_nonce` matches the nonce we
/// sent. Idempotent: replaying the same (or any) `SyncReply` once already
/// `Synced`/`Running` is a no-op.
pub(crate) fn on_sync_reply(state: &mut HandshakeState, incoming_nonce: u32) {
    if let HandshakeState::Syncing { nonce, .. } = state {
        if incoming_nonce == *nonce {
            *state = HandshakeState::Synced { nonce: *nonce };
        }
    }
}

/// Promotes an already-`Synced` device to `Running`. A no-op on any other
/// state (in particular, idempotent if already `Running`).
pub(crate) fn mark_running(state: &mut HandshakeState) {
    if let HandshakeState::Synced { .. } = state {
        *state = HandshakeState::Running;
    }
}
