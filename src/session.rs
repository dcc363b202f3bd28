use instant::Instant;

use crate::device::{Device, DeviceAdapter, DeviceRole};
use crate::diagnostics::DeviceStats;
use crate::error::SessionError;
use crate::handshake;
use crate::message::Message;
use crate::sync_engine::{SyncEngine, SyncEngineConfig};
use crate::time_sync::TimeSyncConfig;
use crate::{Directive, Frame, FRAME_ADVANTAGE_DIFFERENCE, INPUT_REDUNDANCY_FRAMES, MAX_ROLLBACK_FRAMES, MIN_FRAME_ADVANTAGE};

/// Builds a [`Session`]. Mirrors the teacher's `SessionBuilder`: every
/// tunable constant in `spec.md` §6 has a default and a `with_*` method,
/// consuming and returning `Self` so calls chain.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    size_per_player: usize,
    max_rollback_frames: usize,
    input_redundancy_frames: i32,
    time_sync: TimeSyncConfig,
}

impl SessionBuilder {
    /// `size_per_player` is the number of bytes one player's input occupies
    /// in a `GameInput` payload; it's fixed for the life of the session.
    pub fn new(size_per_player: usize) -> Self {
        Self {
            size_per_player,
            max_rollback_frames: MAX_ROLLBACK_FRAMES,
            input_redundancy_frames: INPUT_REDUNDANCY_FRAMES as i32,
            time_sync: TimeSyncConfig {
                min_frame_advantage: MIN_FRAME_ADVANTAGE,
                frame_advantage_difference: FRAME_ADVANTAGE_DIFFERENCE,
            },
        }
    }

    #[must_use]
    pub fn with_max_rollback_frames(mut self, frames: usize) -> Self {
        self.max_rollback_frames = frames;
        self
    }

    #[must_use]
    pub fn with_input_redundancy_frames(mut self, frames: usize) -> Self {
        self.input_redundancy_frames = frames as i32;
        self
    }

    #[must_use]
    pub fn with_min_frame_advantage(mut self, frames: i32) -> Self {
        self.time_sync.min_frame_advantage = frames;
        self
    }

    #[must_use]
    pub fn with_frame_advantage_difference(mut self, frames: i32) -> Self {
        self.time_sync.frame_advantage_difference = frames;
        self
    }

    #[must_use]
    pub fn build(self) -> Session {
        Session {
            size_per_player: self.size_per_player,
            max_rollback_frames: self.max_rollback_frames,
            input_redundancy_frames: self.input_redundancy_frames,
            time_sync: self.time_sync,
            engine: None,
            devices: Vec::new(),
        }
    }
}

/// The host-facing surface: register devices, pump the transport, and
/// drive the simulation. See `spec.md` §6 "Host contract (exposed)".
pub struct Session {
    size_per_player: usize,
    max_rollback_frames: usize,
    input_redundancy_frames: i32,
    time_sync: TimeSyncConfig,
    engine: Option<SyncEngine>,
    devices: Vec<Device>,
}

impl Session {
    /// Registers this process's own device. Must be called exactly once,
    /// before any `add_remote_device` call.
    pub fn set_local_device(
        &mut self,
        device_id: usize,
        player_count: usize,
        frame_delay: i32,
        adapter: Box<dyn DeviceAdapter>,
    ) -> Result<(), SessionError> {
        if self.engine.is_some() {
            return Err(SessionError::InvalidRequest {
                info: "local device already set",
            });
        }
        let mut engine = SyncEngine::new(
            device_id,
            SyncEngineConfig {
                max_rollback_frames: self.max_rollback_frames,
                input_redundancy_frames: self.input_redundancy_frames,
                size_per_player: self.size_per_player,
                time_sync: self.time_sync,
            },
        );
        engine.register_device(device_id, player_count, frame_delay, self.max_rollback_frames);
        self.devices
            .push(Device::new(device_id, DeviceRole::Local, player_count, adapter));
        self.engine = Some(engine);
        Ok(())
    }

    /// Registers a peer device. The local device must already be set.
    pub fn add_remote_device(
        &mut self,
        device_id: usize,
        player_count: usize,
        adapter: Box<dyn DeviceAdapter>,
    ) -> Result<(), SessionError> {
        if self.devices.iter().any(|d| d.id == device_id) {
            return Err(SessionError::InvalidRequest {
                info: "duplicate device id",
            });
        }
        let engine = self.engine.as_mut().ok_or(SessionError::InvalidRequest {
            info: "local device must be set before adding remote devices",
        })?;
        engine.register_device(device_id, player_count, 0, self.max_rollback_frames);
        self.devices
            .push(Device::new(device_id, DeviceRole::Remote, player_count, adapter));
        Ok(())
    }

    /// Drains every device's adapter, dispatches handshake and input
    /// messages, retransmits outstanding `SyncRequest`s, and promotes
    /// devices to `Running` once every remote device has synced. Never
    /// suspends.
    pub fn poll(&mut self) {
        let now = Instant::now();

        for i in 0..self.devices.len() {
            let incoming = self.devices[i].adapter.poll();
            for bytes in incoming {
                let Some(msg) = Message::decode(&bytes) else {
                    continue; // malformed datagram, discarded silently
                };
                self.dispatch(i, msg);
            }
        }

        for device in self.devices.iter_mut() {
            if device.role != DeviceRole::Remote {
                continue;
            }
            if let Some(msg) = handshake::poll_retransmit(&mut device.handshake_state, now) {
                device.adapter.send(msg.encode());
            }
        }

        let all_remote_synced = self
            .devices
            .iter()
            .filter(|d| d.role == DeviceRole::Remote)
            .all(|d| d.handshake_state.is_synced_or_running());
        if all_remote_synced {
            for device in self.devices.iter_mut() {
                if device.role == DeviceRole::Remote {
                    handshake::mark_running(&mut device.handshake_state);
                }
            }
        }
    }

    fn dispatch(&mut self, device_index: usize, msg: Message) {
        match msg {
            Message::SyncRequest { nonce } => {
                let reply = handshake::on_sync_request(nonce);
                self.devices[device_index].adapter.send(reply.encode());
            }
            Message::SyncReply { nonce } => {
                handshake::on_sync_reply(&mut self.devices[device_index].handshake_state, nonce);
            }
            Message::InputBatch {
                start_frame, bytes, ..
            } => {
                if let Some(engine) = self.engine.as_mut() {
                    let device = &mut self.devices[device_index];
                    let acks = engine.ingest_remote_input(device, start_frame as Frame, &bytes);
                    for ack in acks {
                        device.adapter.send(ack.encode());
                    }
                }
            }
            Message::InputAck { .. } => {
                // The redundancy window resends regardless of acks; nothing
                // to do on receipt.
            }
            Message::QualityReport { frame, .. } => {
                self.devices[device_index]
                    .adapter
                    .send(Message::QualityReply { frame }.encode());
            }
            Message::QualityReply { .. } => {}
        }
    }

    /// True once every remote device has completed its handshake.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.devices
            .iter()
            .filter(|d| d.role == DeviceRole::Remote)
            .all(Device::is_running)
    }

    /// Runs one simulation tick with `local_input_bytes` as `device_id`'s
    /// raw input, returning the directives the host must execute in order.
    /// `device_id` must name this session's own `Local` device — passing a
    /// registered remote device's id is rejected with `WrongDeviceRole`,
    /// since local input can only ever originate from the local device.
    pub fn advance_frame(
        &mut self,
        device_id: usize,
        local_input_bytes: &[u8],
    ) -> Result<Vec<Directive>, SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::InvalidRequest {
            info: "local device not set",
        })?;
        let role = self
            .devices
            .iter()
            .find(|d| d.id == device_id)
            .map(|d| d.role)
            .ok_or(SessionError::InvalidRequest {
                info: "unknown device id",
            })?;
        if role != DeviceRole::Local {
            return Err(SessionError::WrongDeviceRole { device_id });
        }
        engine.advance(&mut self.devices, local_input_bytes)
    }

    /// An alternate entry point with the same effect as `advance_frame`,
    /// for hosts that prefer to submit input and consume directives as
    /// separate steps.
    pub fn add_local_input(
        &mut self,
        device_id: usize,
        local_input_bytes: &[u8],
    ) -> Result<Vec<Directive>, SessionError> {
        self.advance_frame(device_id, local_input_bytes)
    }

    /// A snapshot of every device's synchronization state, for hosts that
    /// want to log or display connection quality. Not consulted by the
    /// engine itself.
    #[must_use]
    pub fn device_stats(&self) -> Vec<DeviceStats> {
        self.devices
            .iter()
            .map(|d| DeviceStats {
                device_id: d.id,
                role: d.role.into(),
                remote_frame: d.remote_frame,
                remote_advantage: d.remote_advantage,
                running: d.is_running(),
            })
            .collect()
    }
}
