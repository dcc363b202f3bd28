use crate::frame_info::GameInput;
use crate::{Frame, NULL_FRAME};

/// Extra ring slots kept beyond `max_rollback + frame_delay`, to absorb a
/// little jitter in request ordering without wrapping prematurely.
const INPUT_QUEUE_SLACK: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    frame: Frame,
    input: GameInput,
}

/// Holds, for a single device, the confirmed and predicted input streams
/// described in `spec.md` §3/§4.2.
///
/// Local queues carry a `frame_delay`: local inputs submitted at frame `f`
/// become visible at frame `f + frame_delay`. Remote queues always have
/// `frame_delay == 0`.
#[derive(Debug, Clone)]
pub(crate) struct InputQueue {
    size_per_player: usize,
    player_count: usize,
    frame_delay: i32,
    capacity: usize,
    confirmed: Vec<Option<Slot>>,
    predicted: Vec<Option<Slot>>,
    /// The most recently confirmed input, regardless of its frame — used as
    /// the basis for "repeat last known input" predictions.
    last_confirmed: Option<GameInput>,
}

impl InputQueue {
    pub(crate) fn new(
        max_rollback_frames: usize,
        frame_delay: i32,
        size_per_player: usize,
        player_count: usize,
    ) -> Self {
        let capacity = max_rollback_frames + frame_delay.max(0) as usize + INPUT_QUEUE_SLACK;
        Self {
            size_per_player,
            player_count,
            frame_delay,
            capacity,
            confirmed: vec![None; capacity],
            predicted: vec![None; capacity],
            last_confirmed: None,
        }
    }

    pub(crate) fn frame_delay(&self) -> i32 {
        self.frame_delay
    }

    fn index_of(&self, frame: Frame) -> usize {
        assert!(frame >= 0);
        (frame as usize) % self.capacity
    }

    /// Stores `input` as the confirmed input at `f` (`f + frame_delay` for a
    /// local queue). Idempotent for a duplicate write of the same bytes;
    /// panics if a *different* value is written for a frame already
    /// confirmed, since that would violate the "never overwritten" invariant.
    pub(crate) fn add_input(&mut self, f: Frame, input: GameInput) {
        let stored_frame = f + self.frame_delay;
        let idx = self.index_of(stored_frame);
        let mut stored = input;
        stored.frame = stored_frame;

        if let Some(existing) = &self.confirmed[idx] {
            if existing.frame == stored_frame {
                assert!(
                    existing.input.equal(&stored, true),
                    "confirmed input at frame {stored_frame} was overwritten with a different value"
                );
                return;
            }
        }

        self.confirmed[idx] = Some(Slot {
            frame: stored_frame,
            input: stored.clone(),
        });
        self.last_confirmed = Some(stored);
    }

    /// Returns the confirmed input at `f` if present; otherwise synthesizes
    /// a prediction equal to the last known confirmed input (zero-filled if
    /// there is none yet), records it if `record_prediction_if_missing`, and
    /// returns it. Never fails — reads past the end of what's been written
    /// simply predict.
    pub(crate) fn get_input(&mut self, f: Frame, record_prediction_if_missing: bool) -> GameInput {
        let idx = self.index_of(f);
        if let Some(slot) = &self.confirmed[idx] {
            if slot.frame == f {
                return slot.input.clone();
            }
        }

        let mut predicted = match &self.last_confirmed {
            Some(last) => last.clone(),
            None => GameInput::blank(self.size_per_player, self.player_count),
        };
        predicted.frame = f;

        if record_prediction_if_missing {
            self.predicted[idx] = Some(Slot {
                frame: f,
                input: predicted.clone(),
            });
        }
        predicted
    }

    /// Returns the confirmed input at `f`, if one has been written, without
    /// synthesizing a prediction.
    pub(crate) fn peek_confirmed(&self, f: Frame) -> Option<GameInput> {
        let idx = self.index_of(f);
        match &self.confirmed[idx] {
            Some(slot) if slot.frame == f => Some(slot.input.clone()),
            _ => None,
        }
    }

    /// Returns the prediction record made for frame `f`, or a sentinel with
    /// `frame == NULL_FRAME` if none exists.
    pub(crate) fn get_predicted_input(&self, f: Frame) -> GameInput {
        let idx = self.index_of(f);
        match &self.predicted[idx] {
            Some(slot) if slot.frame == f => slot.input.clone(),
            _ => GameInput::blank(self.size_per_player, self.player_count),
        }
    }

    /// Clears the prediction record at `f`. Idempotent.
    pub(crate) fn reset_prediction(&mut self, f: Frame) {
        let idx = self.index_of(f);
        if matches!(&self.predicted[idx], Some(slot) if slot.frame == f) {
            self.predicted[idx] = None;
        }
    }
}
