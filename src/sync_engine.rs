use std::collections::HashMap;

use crate::device::{Device, DeviceRole};
use crate::error::SessionError;
use crate::frame_info::{concat_payloads, GameInput};
use crate::input_queue::InputQueue;
use crate::message::Message;
use crate::state_storage::StateStorage;
use crate::time_sync::{TimeSync, TimeSyncConfig};
use crate::{Directive, Frame, INITIAL_FRAME};

/// Construction-time parameters for a [`SyncEngine`], collected so
/// `SessionBuilder` has one struct to fill in rather than a long argument
/// list.
#[derive(Debug, Clone)]
pub(crate) struct SyncEngineConfig {
    pub(crate) max_rollback_frames: usize,
    pub(crate) input_redundancy_frames: i32,
    pub(crate) size_per_player: usize,
    pub(crate) time_sync: TimeSyncConfig,
}

/// The per-tick orchestrator described in `spec.md` §4.4. Owns the clock
/// ([`TimeSync`]), the state-slot ring ([`StateStorage`]), and every
/// device's [`InputQueue`]; devices themselves (identity, role, handshake
/// progress, transport) are owned by the session and passed in by
/// reference, since the engine needs to read and occasionally update them
/// but never outlives the session.
pub(crate) struct SyncEngine {
    local_device_id: usize,
    size_per_player: usize,
    input_redundancy_frames: i32,
    time_sync: TimeSync,
    storage: StateStorage,
    queues: HashMap<usize, InputQueue>,
    initial_save_emitted: bool,
}

impl SyncEngine {
    pub(crate) fn new(local_device_id: usize, config: SyncEngineConfig) -> Self {
        Self {
            local_device_id,
            size_per_player: config.size_per_player,
            input_redundancy_frames: config.input_redundancy_frames,
            time_sync: TimeSync::new(config.time_sync),
            storage: StateStorage::new(config.max_rollback_frames + 1),
            queues: HashMap::new(),
            initial_save_emitted: false,
        }
    }

    pub(crate) fn register_device(
        &mut self,
        device_id: usize,
        player_count: usize,
        frame_delay: i32,
        max_rollback_frames: usize,
    ) {
        self.queues.insert(
            device_id,
            InputQueue::new(
                max_rollback_frames,
                frame_delay,
                self.size_per_player,
                player_count,
            ),
        );
    }

    pub(crate) fn local_frame(&self) -> Frame {
        self.time_sync.local_frame()
    }

    /// Concatenates each device's input payload at `frame`, in device-id
    /// order, synthesizing a prediction for any device that hasn't
    /// confirmed that frame yet.
    fn combined_inputs_at(&mut self, devices: &[Device], frame: Frame) -> Vec<u8> {
        let mut ids: Vec<usize> = devices.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        let parts: Vec<Vec<u8>> = ids
            .iter()
            .map(|id| {
                self.queues
                    .get_mut(id)
                    .map(|q| q.get_input(frame, true).bytes().to_vec())
                    .unwrap_or_default()
            })
            .collect();
        concat_payloads(parts.iter().map(|p| p.as_slice()))
    }

    /// Runs one tick: `local_input_bytes` is this device's raw input for
    /// the frame about to be simulated (`local_player_count *
    /// size_per_player` bytes). Returns the directive list the host must
    /// execute, in order.
    pub(crate) fn advance(
        &mut self,
        devices: &mut [Device],
        local_input_bytes: &[u8],
    ) -> Result<Vec<Directive>, SessionError> {
        self.time_sync.recompute_remote_frame(devices);
        let may_advance = self.time_sync.is_time_synced(devices);

        self.sweep_predictions(devices);

        let mut directives = Vec::new();

        if self.time_sync.local_frame() == INITIAL_FRAME && !self.initial_save_emitted {
            directives.push(Directive::Save(
                INITIAL_FRAME,
                self.storage.handle_for(INITIAL_FRAME),
            ));
            self.initial_save_emitted = true;
        }

        if self.time_sync.should_rollback() {
            let sync_frame = self.time_sync.sync_frame();
            self.storage.validate_loadable(sync_frame)?;
            directives.push(Directive::Load(sync_frame, self.storage.handle_for(sync_frame)));

            let mut f = sync_frame + 1;
            while f <= self.time_sync.local_frame() {
                let combined = self.combined_inputs_at(devices, f);
                directives.push(Directive::Advance(f, combined));
                directives.push(Directive::Save(f, self.storage.handle_for(f)));
                f += 1;
            }
        }

        if may_advance {
            let new_local_frame = self.time_sync.local_frame() + 1;
            self.time_sync.set_local_frame(new_local_frame);

            let local_player_count = devices
                .iter()
                .find(|d| d.id == self.local_device_id)
                .map(|d| d.player_count)
                .unwrap_or(0);
            let mut input = GameInput::new(new_local_frame, self.size_per_player, local_player_count);
            input.set_slice(0, local_player_count, local_input_bytes)?;
            if let Some(queue) = self.queues.get_mut(&self.local_device_id) {
                queue.add_input(new_local_frame, input);
            }

            self.broadcast_local_input(devices, new_local_frame);

            let combined = self.combined_inputs_at(devices, new_local_frame);
            directives.push(Directive::Advance(new_local_frame, combined));
            directives.push(Directive::Save(
                new_local_frame,
                self.storage.handle_for(new_local_frame),
            ));
        }

        Ok(directives)
    }

    /// Step 2 of `advance`: walks frames `sync_frame + 1 ..= ceiling`,
    /// clearing every prediction it visits and recording the earliest
    /// frame (if any) where a prediction disagreed with what was actually
    /// confirmed. Sets the new `sync_frame` accordingly.
    fn sweep_predictions(&mut self, devices: &[Device]) {
        let ceiling = self.time_sync.remote_frame().min(self.time_sync.local_frame());
        let mut mistake_at: Option<Frame> = None;
        let mut i = self.time_sync.sync_frame() + 1;
        while i <= ceiling {
            for device in devices {
                if let Some(queue) = self.queues.get_mut(&device.id) {
                    let predicted = queue.get_predicted_input(i);
                    if predicted.frame == i {
                        if let Some(confirmed) = queue.peek_confirmed(i) {
                            if !predicted.equal(&confirmed, false) {
                                mistake_at = Some(i);
                            }
                        }
                    }
                    queue.reset_prediction(i);
                }
            }
            if mistake_at.is_some() {
                break;
            }
            i += 1;
        }
        let new_sync_frame = mistake_at.map(|m| m - 1).unwrap_or(ceiling);
        self.time_sync.set_sync_frame(new_sync_frame);
    }

    /// Sends an `InputBatch` covering the trailing redundancy window to
    /// every remote device.
    fn broadcast_local_input(&mut self, devices: &mut [Device], local_frame: Frame) {
        let frame_delay = match self.queues.get(&self.local_device_id) {
            Some(q) => q.frame_delay(),
            None => return,
        };
        let start = (local_frame - self.input_redundancy_frames).max(INITIAL_FRAME);
        let end = local_frame + frame_delay;

        let mut payload = Vec::new();
        let mut f = start;
        while f <= end {
            if let Some(queue) = self.queues.get_mut(&self.local_device_id) {
                payload.extend_from_slice(queue.get_input(f, false).bytes());
            }
            f += 1;
        }

        let encoded = Message::InputBatch {
            start_frame: start as u32,
            end_frame: end as u32,
            bytes: payload,
        }
        .encode();

        for device in devices.iter_mut() {
            if device.role == DeviceRole::Remote {
                device.adapter.send(encoded.clone());
            }
        }
    }

    /// Applies an inbound `InputBatch` to `device`'s queue. Returns one
    /// `InputAck` per frame that actually advanced `device.remote_frame`.
    /// Frames at or before the device's current `remote_frame` are applied
    /// to the queue idempotently (`InputQueue::add_input` tolerates a
    /// repeat write of the same bytes) but produce no ack: redelivering the
    /// same `InputBatch` must not re-emit acks the sender already has,
    /// per `spec.md` §8's idempotent-replay scenario.
    pub(crate) fn ingest_remote_input(
        &mut self,
        device: &mut Device,
        start_frame: Frame,
        bytes: &[u8],
    ) -> Vec<Message> {
        let frame_size = device.player_count * self.size_per_player;
        if frame_size == 0 || bytes.len() % frame_size != 0 {
            return Vec::new();
        }
        let num_frames = bytes.len() / frame_size;
        let mut acks = Vec::new();
        for n in 0..num_frames {
            let frame = start_frame + n as Frame;
            let chunk = &bytes[n * frame_size..(n + 1) * frame_size];
            let mut input = GameInput::new(frame, self.size_per_player, device.player_count);
            if input.set_slice(0, device.player_count, chunk).is_err() {
                continue;
            }
            if let Some(queue) = self.queues.get_mut(&device.id) {
                queue.add_input(frame, input);
            }
            if frame > device.remote_frame {
                device.remote_frame = frame;
                device.remote_advantage = self.time_sync.local_frame() - frame;
                acks.push(Message::InputAck { frame: frame as u32 });
            }
        }
        acks
    }
}

#[cfg(test)]
mod sync_engine_tests {
    use super::*;
    use crate::test_support::{LoopbackAdapter, NullAdapter};

    fn config() -> SyncEngineConfig {
        SyncEngineConfig {
            max_rollback_frames: 8,
            input_redundancy_frames: 8,
            size_per_player: 1,
            time_sync: TimeSyncConfig::default(),
        }
    }

    fn local_only_engine() -> (SyncEngine, Vec<Device>) {
        let mut engine = SyncEngine::new(0, config());
        engine.register_device(0, 1, 0, 8);
        (engine, vec![Device::new(0, DeviceRole::Local, 1, Box::new(NullAdapter))])
    }

    #[test]
    fn first_tick_emits_initial_save_then_advance_and_save() {
        let (mut engine, mut devices) = local_only_engine();
        let directives = engine.advance(&mut devices, &[7]).unwrap();
        assert!(matches!(directives[0], Directive::Save(f, _) if f == INITIAL_FRAME));
        assert!(matches!(directives[1], Directive::Advance(1, _)));
        assert!(matches!(directives[2], Directive::Save(1, _)));
        assert_eq!(directives.len(), 3);
    }

    #[test]
    fn initial_save_is_only_emitted_once() {
        let (mut engine, mut devices) = local_only_engine();
        engine.advance(&mut devices, &[0]).unwrap();
        let directives = engine.advance(&mut devices, &[0]).unwrap();
        assert!(directives
            .iter()
            .all(|d| !matches!(d, Directive::Save(f, _) if *f == INITIAL_FRAME)));
    }

    #[test]
    fn advance_combines_inputs_in_device_id_order() {
        let mut engine = SyncEngine::new(0, SyncEngineConfig {
            size_per_player: 1,
            ..config()
        });
        engine.register_device(0, 1, 0, 8);
        engine.register_device(1, 1, 0, 8);
        let (a, b) = LoopbackAdapter::pair();
        let mut devices = vec![
            Device::new(0, DeviceRole::Local, 1, Box::new(a)),
            Device::new(1, DeviceRole::Remote, 1, Box::new(b)),
        ];
        devices[1].remote_frame = 0;

        let directives = engine.advance(&mut devices, &[9]).unwrap();
        let combined = directives
            .iter()
            .find_map(|d| match d {
                Directive::Advance(1, bytes) => Some(bytes.clone()),
                _ => None,
            })
            .unwrap();
        // Device 0 (local) contributed [9]; device 1 (remote, never
        // confirmed) predicted a blank [0].
        assert_eq!(combined, vec![9, 0]);
    }

    #[test]
    fn ingest_remote_input_advances_remote_frame_and_acks() {
        let (mut engine, _) = local_only_engine();
        engine.register_device(1, 1, 0, 8);
        let mut remote = Device::new(1, DeviceRole::Remote, 1, Box::new(NullAdapter));

        let acks = engine.ingest_remote_input(&mut remote, 0, &[1, 2, 3]);
        assert_eq!(remote.remote_frame, 2);
        assert_eq!(acks.len(), 3);
        assert_eq!(acks[2], Message::InputAck { frame: 2 });
    }

    #[test]
    fn ingest_remote_input_does_not_regress_remote_frame() {
        let (mut engine, _) = local_only_engine();
        engine.register_device(1, 1, 0, 8);
        let mut remote = Device::new(1, DeviceRole::Remote, 1, Box::new(NullAdapter));
        remote.remote_frame = 5;

        let acks = engine.ingest_remote_input(&mut remote, 0, &[1, 2, 3]);
        assert_eq!(remote.remote_frame, 5);
        assert!(acks.is_empty());
    }

    #[test]
    fn redelivering_the_same_batch_emits_no_new_acks() {
        let (mut engine, _) = local_only_engine();
        engine.register_device(1, 1, 0, 8);
        let mut remote = Device::new(1, DeviceRole::Remote, 1, Box::new(NullAdapter));

        let first = engine.ingest_remote_input(&mut remote, 0, &[1, 2, 3]);
        assert_eq!(first.len(), 3);

        let second = engine.ingest_remote_input(&mut remote, 0, &[1, 2, 3]);
        assert!(second.is_empty());
        assert_eq!(remote.remote_frame, 2);
    }

    #[test]
    fn mismatched_local_input_size_is_rejected() {
        let (mut engine, mut devices) = local_only_engine();
        let err = engine.advance(&mut devices, &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            SessionError::SizeMismatch {
                actual: 2,
                expected: 1
            }
        );
    }
}
