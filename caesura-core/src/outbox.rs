//! Bounded hand-off between the segmentation engine and the consumer thread.
//!
//! The channel carries [`SegmentMessage`]s: ordinary segments, then exactly
//! one end-of-stream sentinel after the stop-time flush. The sentinel is a
//! distinct enum variant rather than a magic data value, so a legitimate
//! zero-length segment can never be mistaken for stream end.
//!
//! Backpressure policy: the queue is bounded; `put` tries a non-blocking send
//! first and falls back to a blocking send with a warning when the consumer
//! lags. The capture ring upstream gives the pipeline tens of seconds of
//! headroom while `put` waits.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

use crate::buffering::segment::AudioSegment;
use crate::error::{CaesuraError, Result};

/// Default queue bound, in segments. At the default 3 s cycle this is well
/// over a minute of backlog before the producer blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Message delivered to the consumer thread.
#[derive(Debug, Clone)]
pub enum SegmentMessage {
    /// An accepted audio segment, in chronological order.
    Segment(AudioSegment),
    /// No further segments will arrive. Sent exactly once, after the final flush.
    EndOfStream,
}

/// Producer half, owned by the segmentation engine.
#[derive(Debug)]
pub struct SegmentSender {
    tx: Sender<SegmentMessage>,
}

/// Consumer half, handed to the worker thread that drains segments.
#[derive(Debug)]
pub struct SegmentReceiver {
    rx: Receiver<SegmentMessage>,
    /// Set once the sentinel (or a disconnect) has been observed.
    finished: bool,
}

/// Create a bounded segment queue.
pub fn segment_channel(capacity: usize) -> (SegmentSender, SegmentReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        SegmentSender { tx },
        SegmentReceiver {
            rx,
            finished: false,
        },
    )
}

impl SegmentSender {
    /// Push a segment, blocking if the queue is full.
    ///
    /// Fails only when the receiver has been dropped.
    pub fn put(&self, segment: AudioSegment) -> Result<()> {
        match self.tx.try_send(SegmentMessage::Segment(segment)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(msg)) => {
                warn!("segment queue full; consumer is lagging, blocking until it drains");
                self.tx
                    .send(msg)
                    .map_err(|_| CaesuraError::ChannelDisconnected("segment queue".into()))
            }
            Err(TrySendError::Disconnected(_)) => Err(CaesuraError::ChannelDisconnected(
                "segment queue".into(),
            )),
        }
    }

    /// Send the end-of-stream sentinel and drop the sender.
    ///
    /// Consuming `self` makes a second sentinel unrepresentable.
    pub fn finish(self) -> Result<()> {
        self.tx
            .send(SegmentMessage::EndOfStream)
            .map_err(|_| CaesuraError::ChannelDisconnected("segment queue".into()))
    }
}

impl SegmentReceiver {
    /// Block until the next segment arrives.
    ///
    /// Returns `None` once the end-of-stream sentinel has been received, or
    /// if the producer vanished without sending one (logged as a warning,
    /// once). Every call after stream end returns `None` without touching
    /// the channel.
    pub fn recv(&mut self) -> Option<AudioSegment> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(SegmentMessage::Segment(segment)) => Some(segment),
            Ok(SegmentMessage::EndOfStream) => {
                self.finished = true;
                None
            }
            Err(_) => {
                self.finished = true;
                warn!("segment queue closed without an end-of-stream sentinel");
                None
            }
        }
    }

    /// Number of segments currently waiting in the queue.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Iterator for SegmentReceiver {
    type Item = AudioSegment;

    fn next(&mut self) -> Option<AudioSegment> {
        self.recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(len: usize, offset: u64) -> AudioSegment {
        AudioSegment::new(vec![100i16; len], 16_000, offset)
    }

    #[test]
    fn delivers_segments_in_fifo_order() {
        let (tx, rx) = segment_channel(8);
        tx.put(seg(10, 0)).unwrap();
        tx.put(seg(20, 10)).unwrap();
        tx.put(seg(30, 30)).unwrap();
        tx.finish().unwrap();

        let offsets: Vec<u64> = rx.map(|s| s.start_offset).collect();
        assert_eq!(offsets, vec![0, 10, 30]);
    }

    #[test]
    fn sentinel_yields_none_and_stays_none() {
        let (tx, mut rx) = segment_channel(4);
        tx.put(seg(5, 0)).unwrap();
        tx.finish().unwrap();

        assert!(rx.recv().is_some());
        assert!(rx.recv().is_none());
        // Receives after the sentinel stay None; the closed channel is the
        // normal end of stream here, not a producer failure.
        assert!(rx.recv().is_none());
        assert!(rx.recv().is_none());
    }

    #[test]
    fn dropped_sender_without_sentinel_ends_stream() {
        let (tx, mut rx) = segment_channel(4);
        tx.put(seg(5, 0)).unwrap();
        drop(tx);

        assert!(rx.recv().is_some());
        assert!(rx.recv().is_none());
        assert!(rx.recv().is_none());
    }

    #[test]
    fn put_blocks_on_full_queue_until_consumer_drains() {
        let (tx, mut rx) = segment_channel(1);
        tx.put(seg(1, 0)).unwrap();

        let handle = std::thread::spawn(move || {
            let mut got = Vec::new();
            while let Some(s) = rx.recv() {
                got.push(s.start_offset);
            }
            got
        });

        // Queue is full; this put must block until the thread drains it.
        tx.put(seg(1, 1)).unwrap();
        tx.finish().unwrap();

        let got = handle.join().unwrap();
        assert_eq!(got, vec![0, 1]);
    }

    #[test]
    fn put_fails_when_receiver_dropped() {
        let (tx, rx) = segment_channel(2);
        drop(rx);
        assert!(tx.put(seg(1, 0)).is_err());
    }
}
