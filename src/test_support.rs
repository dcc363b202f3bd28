//! Shared test doubles used by unit tests across modules. Not compiled into
//! the published crate.

use crate::device::DeviceAdapter;

/// An adapter that never sends or receives anything. Useful wherever a test
/// needs a `Device` but never exercises its transport.
#[derive(Debug, Default)]
pub(crate) struct NullAdapter;

impl DeviceAdapter for NullAdapter {
    fn send(&mut self, _bytes: Vec<u8>) {}

    fn poll(&mut self) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

/// A loopback pair: bytes sent on one end are delivered to the other end's
/// next `poll()`. Grounded on the teacher's in-process socket doubles used
/// in `tests/test_p2p_session.rs`.
#[derive(Debug, Default)]
pub(crate) struct LoopbackAdapter {
    outbox: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    inbox: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
}

impl LoopbackAdapter {
    /// Creates a connected pair: `(a, b)` such that whatever `a` sends, `b`
    /// receives on its next `poll()`, and vice versa.
    pub(crate) fn pair() -> (Self, Self) {
        let a_to_b = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let b_to_a = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
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
