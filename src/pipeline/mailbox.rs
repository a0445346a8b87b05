use std::sync::{Arc, Mutex, PoisonError};

use crate::types::{QueryPoint, TrackedHand};

/// Single-slot handoff between the detection listener and the render loop.
/// Writers overwrite, readers peek.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

/// The latest fingertip to sample depth at.
pub type QueryMailbox = Mailbox<QueryPoint>;

/// The latest hand to draw.
pub type HandMailbox = Mailbox<TrackedHand>;

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn post(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(value);
    }

    pub fn latest(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl<T: Clone> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn point(sequence: u64) -> QueryPoint {
        QueryPoint {
            x: sequence as f32,
            y: sequence as f32 * 2.0,
            image_width: 640,
            image_height: 480,
            sequence,
        }
    }

    #[test]
    fn starts_empty() {
        assert!(QueryMailbox::new().latest().is_none());
    }

    #[test]
    fn keeps_only_the_last_write() {
        let mailbox = QueryMailbox::new();
        mailbox.post(point(1));
        mailbox.post(point(2));
        mailbox.post(point(3));
        assert_eq!(mailbox.latest(), Some(point(3)));
        // Reading does not consume.
        assert_eq!(mailbox.latest(), Some(point(3)));

        mailbox.clear();
        assert!(mailbox.latest().is_none());
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let mailbox = QueryMailbox::new();
        let writers: Vec<_> = (0..4u64)
            .map(|w| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        mailbox.post(point(w * 1_000 + i));
                    }
                })
            })
            .collect();

        for _ in 0..2_000 {
            if let Some(p) = mailbox.latest() {
                assert_eq!(p.x, p.sequence as f32);
                assert_eq!(p.y, p.sequence as f32 * 2.0);
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert!(mailbox.latest().is_some());
    }
}
