//! Latest-only channel
//!
//! Only the newest frame is worth showing. The sender never blocks: when the
//! slot is taken the older item is dropped and replaced.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Create a single-slot channel that keeps the latest item
pub fn latest_channel<T>() -> (LatestSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(1);
    let drain = rx.clone();
    (LatestSender { tx, drain }, rx)
}

/// Sending half of a latest-only channel
pub struct LatestSender<T> {
    tx: Sender<T>,
    drain: Receiver<T>,
}

impl<T> LatestSender<T> {
    /// Publish an item, dropping the pending one if the consumer is behind.
    ///
    /// Returns `true` when an older item was dropped.
    pub fn publish(&self, item: T) -> bool {
        let mut item = item;
        let mut dropped = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return dropped,
                Err(TrySendError::Full(back)) => {
                    dropped |= self.drain.try_recv().is_ok();
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return dropped,
            }
        }
    }
}
