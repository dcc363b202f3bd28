//! End-to-end scenarios driven entirely through the public `Session` API,
//! mirroring the teacher's `tests/test_p2p_session.rs` in structure: an
//! in-memory loopback transport standing in for a real socket, two sessions
//! polled in lockstep.

use std::cell::RefCell;
use std::rc::Rc;

use rollnet_core::{DeviceAdapter, Directive, SessionBuilder, SessionError};

/// A connected pair of in-memory transports: bytes sent on one end are
/// delivered to the other end's next `poll()`.
#[derive(Default)]
struct LoopbackAdapter {
    outbox: Rc<RefCell<Vec<Vec<u8>>>>,
    inbox: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl LoopbackAdapter {
    fn pair() -> (Self, Self) {
        let a_to_b = Rc::new(RefCell::new(Vec::new()));
        let b_to_a = Rc::new(RefCell::new(Vec::new()));
        let a = Self {
            outbox: a_to_b.clone(),
            inbox: b_to_a.clone(),
        };
        let b = Self {
            outbox: b_to_a,
            inbox: a_to_b,
        };
        (a, b)
    }
}

impl DeviceAdapter for LoopbackAdapter {
    fn send(&mut self, bytes: Vec<u8>) {
        self.outbox.borrow_mut().push(bytes);
    }

    fn poll(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.inbox.borrow_mut())
    }
}

/// An adapter with nobody on the other end — never sends anything anywhere.
#[derive(Default)]
struct NullAdapter;

impl DeviceAdapter for NullAdapter {
    fn send(&mut self, _bytes: Vec<u8>) {}
    fn poll(&mut self) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

fn advance_frame_of(directives: &[Directive]) -> Option<i32> {
    directives.iter().find_map(|d| match d {
        Directive::Advance(f, _) => Some(*f),
        _ => None,
    })
}

#[test]
fn single_peer_lockstep_matches_expected_directive_sequence() {
    let mut session = SessionBuilder::new(1).build();
    session
        .set_local_device(0, 1, 0, Box::new(NullAdapter))
        .unwrap();

    let first = session.advance_frame(0, &[0]).unwrap();
    assert!(matches!(first[0], Directive::Save(0, _)));
    assert!(matches!(first[1], Directive::Advance(1, _)));
    assert!(matches!(first[2], Directive::Save(1, _)));
    assert_eq!(first.len(), 3);

    for expected_frame in 2..60 {
        let directives = session.advance_frame(0, &[0]).unwrap();
        assert_eq!(directives.len(), 2, "frame {expected_frame}");
        assert!(matches!(directives[0], Directive::Advance(f, _) if f == expected_frame));
        assert!(matches!(directives[1], Directive::Save(f, _) if f == expected_frame));
    }
}

#[test]
fn three_peer_handshake_converges() {
    let mut hub = SessionBuilder::new(1).build();
    let mut leaf_a = SessionBuilder::new(1).build();
    let mut leaf_b = SessionBuilder::new(1).build();

    let (hub_to_a, a_to_hub) = LoopbackAdapter::pair();
    let (hub_to_b, b_to_hub) = LoopbackAdapter::pair();

    hub.set_local_device(0, 1, 0, Box::new(NullAdapter)).unwrap();
    hub.add_remote_device(1, 1, Box::new(hub_to_a)).unwrap();
    hub.add_remote_device(2, 1, Box::new(hub_to_b)).unwrap();

    leaf_a.set_local_device(1, 1, 0, Box::new(NullAdapter)).unwrap();
    leaf_a.add_remote_device(0, 1, Box::new(a_to_hub)).unwrap();

    leaf_b.set_local_device(2, 1, 0, Box::new(NullAdapter)).unwrap();
    leaf_b.add_remote_device(0, 1, Box::new(b_to_hub)).unwrap();

    for _ in 0..6 {
        hub.poll();
        leaf_a.poll();
        leaf_b.poll();
    }

    assert!(hub.is_running());
    assert!(leaf_a.is_running());
    assert!(leaf_b.is_running());
}

#[test]
fn two_peers_agree_on_combined_input_once_synced() {
    let mut a = SessionBuilder::new(1).build();
    let mut b = SessionBuilder::new(1).build();
    let (adapter_a, adapter_b) = LoopbackAdapter::pair();

    a.set_local_device(0, 1, 0, Box::new(NullAdapter)).unwrap();
    a.add_remote_device(1, 1, Box::new(adapter_a)).unwrap();
    b.set_local_device(1, 1, 0, Box::new(NullAdapter)).unwrap();
    b.add_remote_device(0, 1, Box::new(adapter_b)).unwrap();

    for _ in 0..5 {
        a.poll();
        b.poll();
    }
    assert!(a.is_running() && b.is_running());

    let mut last_combined_a = None;
    let mut last_combined_b = None;
    for tick in 0..40 {
        let da = a.advance_frame(0, &[tick as u8]).unwrap();
        let db = b.advance_frame(1, &[(tick as u8).wrapping_mul(3)]).unwrap();
        a.poll();
        b.poll();

        for d in &da {
            if let Directive::Advance(f, bytes) = d {
                last_combined_a = Some((*f, bytes.clone()));
            }
        }
        for d in &db {
            if let Directive::Advance(f, bytes) = d {
                last_combined_b = Some((*f, bytes.clone()));
            }
        }
    }

    // Both local inputs and both remote-predicted inputs are two bytes wide
    // once combined (one device each, one byte per player).
    let (_, bytes_a) = last_combined_a.unwrap();
    let (_, bytes_b) = last_combined_b.unwrap();
    assert_eq!(bytes_a.len(), 2);
    assert_eq!(bytes_b.len(), 2);
}

#[test]
fn unresponsive_remote_device_never_triggers_a_spurious_rollback_error() {
    // A registered remote device that never sends anything leaves
    // `sync_frame` at `NULL_FRAME` forever: nothing has been confirmed, so
    // nothing has been verified wrong, and no `Load` should ever be issued
    // against a storage slot that was never populated by this peer.
    let mut session = SessionBuilder::new(1)
        .with_max_rollback_frames(2)
        .with_min_frame_advantage(1000)
        .with_frame_advantage_difference(1000)
        .build();
    session
        .set_local_device(0, 1, 0, Box::new(NullAdapter))
        .unwrap();
    session
        .add_remote_device(1, 1, Box::new(NullAdapter))
        .unwrap();

    for _ in 0..10 {
        let directives = session.advance_frame(0, &[0]).unwrap();
        assert!(!directives.iter().any(|d| matches!(d, Directive::Load(..))));
    }
}

#[test]
fn advance_frame_rejects_mismatched_local_input_size() {
    let mut session = SessionBuilder::new(2).build();
    session
        .set_local_device(0, 1, 0, Box::new(NullAdapter))
        .unwrap();

    let err = session.advance_frame(0, &[1]).unwrap_err();
    assert_eq!(
        err,
        SessionError::SizeMismatch {
            actual: 1,
            expected: 2
        }
    );
}

#[test]
fn advance_frame_rejects_adding_local_input_to_a_remote_device() {
    let mut session = SessionBuilder::new(1).build();
    session
        .set_local_device(0, 1, 0, Box::new(NullAdapter))
        .unwrap();
    session
        .add_remote_device(1, 1, Box::new(NullAdapter))
        .unwrap();

    let err = session.advance_frame(1, &[0]).unwrap_err();
    assert_eq!(err, SessionError::WrongDeviceRole { device_id: 1 });
}

#[test]
fn device_stats_reports_running_state_after_handshake() {
    let mut a = SessionBuilder::new(1).build();
    let mut b = SessionBuilder::new(1).build();
    let (adapter_a, adapter_b) = LoopbackAdapter::pair();

    a.set_local_device(0, 1, 0, Box::new(NullAdapter)).unwrap();
    a.add_remote_device(1, 1, Box::new(adapter_a)).unwrap();
    b.set_local_device(1, 1, 0, Box::new(NullAdapter)).unwrap();
    b.add_remote_device(0, 1, Box::new(adapter_b)).unwrap();

    let stats_before = a.device_stats();
    assert!(!stats_before.iter().any(|s| s.device_id == 1 && s.running));

    for _ in 0..5 {
        a.poll();
        b.poll();
    }

    let stats_after = a.device_stats();
    let remote = stats_after.iter().find(|s| s.device_id == 1).unwrap();
    assert!(remote.running);
}

#[test]
fn duplicate_input_batch_delivery_is_idempotent() {
    // Two peers that exchange and then fully agree; the redundancy window
    // means every `InputBatch` resends several already-acked frames, so a
    // peer must tolerate replays of the same frame without erroring or
    // regressing what it has already recorded for the sender.
    let mut a = SessionBuilder::new(1).build();
    let mut b = SessionBuilder::new(1).build();
    let (adapter_a, adapter_b) = LoopbackAdapter::pair();

    a.set_local_device(0, 1, 0, Box::new(NullAdapter)).unwrap();
    a.add_remote_device(1, 1, Box::new(adapter_a)).unwrap();
    b.set_local_device(1, 1, 0, Box::new(NullAdapter)).unwrap();
    b.add_remote_device(0, 1, Box::new(adapter_b)).unwrap();

    for _ in 0..5 {
        a.poll();
        b.poll();
    }

    for tick in 0u8..20 {
        a.advance_frame(0, &[tick]).unwrap();
        b.advance_frame(1, &[tick]).unwrap();
        // Poll each side twice in a row: the redundancy window in the
        // second session's outbound batch resends frames the first side
        // already applied.
        a.poll();
        a.poll();
        b.poll();
        b.poll();
    }

    // Every tick's broadcast resends the trailing redundancy window, so by
    // this point each side has reapplied many already-seen frames without
    // panicking (`InputQueue::add_input` asserts on a *conflicting*
    // rewrite) and without its `remote_frame` view of the peer regressing.
    let remote_frame = a
        .device_stats()
        .into_iter()
        .find(|s| s.device_id == 1)
        .unwrap()
        .remote_frame;
    assert!(remote_frame >= 0);

    assert!(advance_frame_of(&a.advance_frame(0, &[0]).unwrap()).is_some());
}
