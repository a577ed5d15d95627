//! Per-transceiver reorder buffer. Packets arrive out of order and sometimes
//! not at all; this assembles them back into frames in RTP sequence order,
//! tolerating a bounded amount of loss and reordering before giving up on a
//! frame.

use std::collections::BTreeMap;

use rtp::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Ready,
    Dropped,
}

pub struct FrameEvent {
    pub start_seq: u16,
    pub end_seq: u16,
    pub total_size: usize,
    pub rtp_timestamp: u32,
    pub outcome: FrameOutcome,
}

/// Reports whether the packet's payload opens a new frame, per the active
/// codec's depayloader (e.g. the VP8/H264 payload-header start bit).
pub trait FrameStartProbe: Send + Sync {
    fn is_start(&self, packet: &Packet) -> bool;
}

pub struct JitterBuffer {
    packets: BTreeMap<u16, Packet>,
    depay_probe: Box<dyn FrameStartProbe>,
    started: bool,
    last_removed: u16,
    last_push_timestamp: u32,
    max_latency: u32,
    clock_rate: u32,
    transit: Option<i64>,
    jitter: f64,
}

impl JitterBuffer {
    pub fn new(depay_probe: Box<dyn FrameStartProbe>, clock_rate: u32, max_latency: u32) -> Self {
        Self {
            packets: BTreeMap::new(),
            depay_probe,
            started: false,
            last_removed: 0,
            last_push_timestamp: 0,
            max_latency,
            clock_rate,
            transit: None,
            jitter: 0.0,
        }
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Inserts `packet`, returning `true` if it was accepted and `false` if it
    /// was dropped as stale (its sequence number is outside the latency
    /// window behind the last-pushed timestamp).
    pub fn push(&mut self, packet: Packet, arrival_ts_clock_units: u32) -> bool {
        let seq = packet.header.sequence_number;
        let rtp_ts = packet.header.timestamp;

        if !self.started {
            self.last_removed = seq.wrapping_sub(1);
            self.started = true;
        }

        let stale = self.last_push_timestamp != 0
            && self.last_push_timestamp.wrapping_sub(rtp_ts) < u32::MAX / 2
            && self.last_push_timestamp.wrapping_sub(rtp_ts) >= self.max_latency;
        if stale {
            return false;
        }

        self.update_interarrival_jitter(rtp_ts, arrival_ts_clock_units);

        self.packets.insert(seq, packet);

        if rtp_ts.wrapping_sub(self.last_push_timestamp) < u32::MAX / 2 {
            self.last_push_timestamp = rtp_ts;
        }

        true
    }

    fn update_interarrival_jitter(&mut self, rtp_ts: u32, arrival_ts: u32) {
        let transit = arrival_ts as i64 - rtp_ts as i64;
        if let Some(prev_transit) = self.transit {
            let d = (transit - prev_transit).unsigned_abs() as f64;
            self.jitter += (d - self.jitter) / 16.0;
        }
        self.transit = Some(transit);
    }

    /// Scans forward from `last_removed + 1` for complete or abandonable
    /// frames, emitting one event per frame boundary crossed.
    pub fn pop(&mut self, closing: bool) -> Vec<FrameEvent> {
        let mut events = Vec::new();

        loop {
            let start = self.last_removed.wrapping_add(1);
            let Some((&first_seq, first_packet)) = self.packets.range(start..).next() else {
                break;
            };
            if first_seq != start {
                // gap right after last_removed: nothing contiguous yet.
                if !closing {
                    break;
                }
            }
            if !self.depay_probe.is_start(first_packet) && !closing {
                break;
            }

            let frame_timestamp = first_packet.header.timestamp;
            let mut end_seq = first_seq;
            let mut total_size = first_packet.payload.len();
            let mut contiguous = true;
            let mut cursor = first_seq;

            loop {
                let next_seq = cursor.wrapping_add(1);
                match self.packets.get(&next_seq) {
                    Some(next_packet) if next_packet.header.timestamp == frame_timestamp => {
                        end_seq = next_seq;
                        total_size += next_packet.payload.len();
                        cursor = next_seq;
                    }
                    Some(_) => break, // next packet starts a new frame
                    None => {
                        contiguous = false;
                        break;
                    }
                }
            }

            let past_horizon = closing
                || self
                    .last_push_timestamp
                    .wrapping_sub(frame_timestamp)
                    >= self.max_latency;

            if contiguous && (past_horizon || closing) {
                events.push(FrameEvent {
                    start_seq: first_seq,
                    end_seq,
                    total_size,
                    rtp_timestamp: frame_timestamp,
                    outcome: FrameOutcome::Ready,
                });
                self.drop_range(first_seq, end_seq);
                continue;
            }

            if !contiguous && past_horizon {
                events.push(FrameEvent {
                    start_seq: first_seq,
                    end_seq: cursor,
                    total_size,
                    rtp_timestamp: frame_timestamp,
                    outcome: FrameOutcome::Dropped,
                });
                self.drop_range(first_seq, cursor);
                continue;
            }

            break;
        }

        events
    }

    fn drop_range(&mut self, start: u16, end: u16) {
        let mut seq = start;
        loop {
            self.packets.remove(&seq);
            if seq == end {
                break;
            }
            seq = seq.wrapping_add(1);
        }
        self.last_removed = end;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rtp::header::Header;

    struct AlwaysStart;
    impl FrameStartProbe for AlwaysStart {
        fn is_start(&self, _packet: &Packet) -> bool {
            true
        }
    }

    fn packet(seq: u16, ts: u32, payload: &[u8]) -> Packet {
        Packet {
            header: Header {
                sequence_number: seq,
                timestamp: ts,
                ..Default::default()
            },
            payload: bytes::Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn test_push_then_pop_contiguous_frame() {
        let mut jb = JitterBuffer::new(Box::new(AlwaysStart), 90_000, 300_000);
        assert!(jb.push(packet(1, 1000, b"a"), 1000));
        assert!(jb.push(packet(2, 1000, b"b"), 1001));
        assert!(jb.push(packet(3, 2000, b"c"), 2000));

        let events = jb.pop(false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_seq, 1);
        assert_eq!(events[0].end_seq, 2);
        assert_eq!(events[0].outcome, FrameOutcome::Ready);
    }

    #[test]
    fn test_no_entries_at_or_below_last_removed_after_pop() {
        let mut jb = JitterBuffer::new(Box::new(AlwaysStart), 90_000, 300_000);
        jb.push(packet(5, 1000, b"a"), 1000);
        jb.push(packet(6, 2000, b"b"), 2000);
        jb.pop(false);

        assert!(jb.packets.range(..=jb.last_removed).next().is_none());
    }

    #[test]
    fn test_close_flushes_incomplete_trailing_frame() {
        let mut jb = JitterBuffer::new(Box::new(AlwaysStart), 90_000, 300_000);
        jb.push(packet(10, 5000, b"partial"), 5000);

        let events = jb.pop(true);
        assert_eq!(events.len(), 1);
        assert!(jb.is_empty());
    }
}
