//! Cross-execution-context transport.
//!
//! A bounded `crossbeam_channel` pair generalized from a single fixed
//! message shape to any `(Request, Response)` pair, so it can carry both
//! the montage worker's and the reader worker's commission traffic over
//! plain OS threads.

use crossbeam_channel::{bounded, Receiver, RecvError, Sender, TryRecvError, TryIter};
pub use crossbeam_channel::{SendError, TrySendError};

/// One end of a bidirectional channel: receives `R`, sends `S`.
pub struct BiChannel<R, S> {
    pub receiver: Receiver<R>,
    pub sender: Sender<S>,
}

impl<R, S> BiChannel<R, S> {
    /// Build a connected pair of endpoints, each bounded to `cap` in-flight
    /// messages per direction.
    pub fn bounded<R_, S_>(cap: usize) -> (BiChannel<R_, S_>, BiChannel<S_, R_>) {
        let (s1, r1) = bounded(cap);
        let (s2, r2) = bounded(cap);
        (
            BiChannel {
                receiver: r1,
                sender: s2,
            },
            BiChannel {
                receiver: r2,
                sender: s1,
            },
        )
    }

    pub fn try_recv(&self) -> Result<R, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv(&self) -> Result<R, RecvError> {
        self.receiver.recv()
    }

    pub fn recv_try_iter(&self) -> TryIter<R> {
        self.receiver.try_iter()
    }

    pub fn try_send(&self, msg: S) -> Result<(), TrySendError<S>> {
        self.sender.try_send(msg)
    }

    pub fn send(&self, msg: S) -> Result<(), SendError<S>> {
        self.sender.send(msg)
    }
}
