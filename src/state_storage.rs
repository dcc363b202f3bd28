use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SessionError;
use crate::{Frame, NULL_FRAME};

#[derive(Debug)]
struct CellInner {
    frame: Frame,
    data: Option<Vec<u8>>,
}

impl Default for CellInner {
    fn default() -> Self {
        Self {
            frame: NULL_FRAME,
            data: None,
        }
    }
}

/// A handle to one ring-buffer slot, handed to the host alongside a `Save`
/// or `Load` directive so it can write or read the opaque game-state blob
/// for that frame without the core ever inspecting the bytes itself.
///
/// Mirrors the teacher's `GameStateCell` (an `Arc<Mutex<GameState<T>>>`
/// shared between the core and the host's worker thread), but uses
/// `Rc<RefCell<_>>` instead: per `spec.md` §5 the core is single-threaded
/// and cooperatively driven, so nothing here is ever accessed from more
/// than one thread at a time.
#[derive(Debug, Clone)]
pub struct StateHandle(Rc<RefCell<CellInner>>);

impl StateHandle {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(CellInner::default())))
    }

    /// Called by the host in response to a `Save(frame, handle)` directive.
    pub fn save(&self, frame: Frame, data: Vec<u8>) {
        assert!(frame != NULL_FRAME);
        let mut inner = self.0.borrow_mut();
        inner.frame = frame;
        inner.data = Some(data);
    }

    /// Called by the host in response to a `Load(frame, handle)` directive.
    /// `None` would indicate a scheduler bug — the session validates a
    /// slot's occupancy before ever handing out a `Load` directive for it.
    #[must_use]
    pub fn load(&self) -> Option<Vec<u8>> {
        self.0.borrow().data.clone()
    }

    fn frame(&self) -> Frame {
        self.0.borrow().frame
    }

    fn is_empty(&self) -> bool {
        self.0.borrow().data.is_none()
    }
}

/// A fixed-capacity circular buffer of [`StateHandle`]s, one per ring slot.
/// Slot for frame `f` lives at index `f mod capacity`. Writing a slot
/// overwrites whatever frame previously occupied it; no alias to the old
/// contents survives past the overwrite, since `StateHandle::save` replaces
/// the cell's contents in place.
#[derive(Debug, Clone)]
pub(crate) struct StateStorage {
    slots: Vec<StateHandle>,
}

impl StateStorage {
    /// Creates storage with `capacity` slots (`MAX_ROLLBACK_FRAMES + 1`).
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            slots: (0..capacity).map(|_| StateHandle::new()).collect(),
        }
    }

    fn index_for(&self, frame: Frame) -> usize {
        (frame as usize) % self.slots.len()
    }

    /// Returns the handle for `frame`'s slot, to hand out alongside a
    /// `Save` or `Load` directive.
    pub(crate) fn handle_for(&self, frame: Frame) -> StateHandle {
        assert!(frame != NULL_FRAME);
        let idx = self.index_for(frame);
        self.slots[idx].clone()
    }

    /// Checks that `frame`'s slot still holds that exact frame's data
    /// before the engine hands out a `Load` directive for it.
    ///
    /// Returns `FrameOutOfWindow` if the slot has since been overwritten by
    /// a newer frame (the ring wrapped around), and `MissingState` if the
    /// slot is within range but was never written this generation of the
    /// ring.
    pub(crate) fn validate_loadable(&self, frame: Frame) -> Result<(), SessionError> {
        if frame == NULL_FRAME {
            return Err(SessionError::FrameOutOfWindow { frame });
        }
        let idx = self.index_for(frame);
        let slot = &self.slots[idx];
        if slot.frame() == frame && !slot.is_empty() {
            Ok(())
        } else if slot.frame() > frame {
            Err(SessionError::FrameOutOfWindow { frame })
        } else {
            Err(SessionError::MissingState { frame })
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
}
