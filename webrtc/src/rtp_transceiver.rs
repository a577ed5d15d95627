//! Send and receive sides of a single RTP stream: packetization, the
//! retransmit ring NACK draws from, sender-report scheduling, and the
//! receiver-side stats that ride on top of the jitter buffer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rtcp::sender_report::SenderReport;
use rtp::header::Header;
use rtp::packet::Packet;

use crate::jitter_buffer::{FrameEvent, FrameOutcome, FrameStartProbe, JitterBuffer};

/// Splits an encoded frame into RTP payloads. Codec-specific (VP8/H264/Opus);
/// the transceiver only fills in the RTP header around whatever payloads
/// come back.
pub trait Packetizer: Send + Sync {
    fn packetize(&self, frame: &[u8], mtu: usize) -> Vec<Bytes>;
}

/// Encrypts/decrypts in place for a bound SRTP/SRTCP session. Kept as a seam
/// so the transceiver doesn't need to know about key derivation.
pub trait SrtpSession: Send + Sync {
    fn encrypt_rtp(&self, header: &Header, payload: &[u8]) -> Vec<u8>;
    fn decrypt_rtp(&self, packet: &[u8]) -> Option<Packet>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SenderStats {
    pub frames_encoded: u64,
    pub frames_sent: u64,
    pub keyframes_encoded: u64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub huge_frames_sent: u64,
    pub frames_discarded_on_send: u64,
    pub bytes_discarded_on_send: u64,
    pub packets_discarded_on_send: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiverStats {
    pub frames_received: u64,
    pub packets_discarded: u64,
    pub packets_failed_decryption: u64,
    pub jitter_buffer_delay: Duration,
}

const HUGE_FRAME_FACTOR: f64 = 2.5;
const SR_MIN_SEND_AGE: Duration = Duration::from_millis(2500);
const SR_INTERVAL_BASE: Duration = Duration::from_millis(200);
const SR_INTERVAL_JITTER: Duration = Duration::from_millis(100);

/// Outbound half of a transceiver: one SSRC, one payload type, one
/// retransmit ring.
pub struct RtpSender {
    ssrc: u32,
    payload_type: u8,
    clock_rate: u32,
    next_seq: u16,
    packetizer: Box<dyn Packetizer>,
    retransmit_ring: VecDeque<Packet>,
    retransmit_capacity: usize,
    stats: SenderStats,
    first_frame_sent_at: Option<Instant>,
    last_sr_sent_at: Option<Instant>,
}

impl RtpSender {
    pub fn new(
        ssrc: u32,
        payload_type: u8,
        clock_rate: u32,
        packetizer: Box<dyn Packetizer>,
        retransmit_capacity: usize,
    ) -> Self {
        Self {
            ssrc,
            payload_type,
            clock_rate,
            next_seq: 0,
            packetizer,
            retransmit_ring: VecDeque::with_capacity(retransmit_capacity),
            retransmit_capacity,
            stats: SenderStats::default(),
            first_frame_sent_at: None,
            last_sr_sent_at: None,
        }
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Packetizes `frame`, stamping each packet with a monotonic sequence
    /// number and the given RTP timestamp, and returns the packets to send.
    /// Each packet is also kept in the retransmit ring.
    pub fn write_frame(
        &mut self,
        frame: &[u8],
        rtp_timestamp: u32,
        mtu: usize,
        is_keyframe: bool,
        expected_size: usize,
        now: Instant,
    ) -> Vec<Packet> {
        let payloads = self.packetizer.packetize(frame, mtu);
        let mut packets = Vec::with_capacity(payloads.len());

        for (i, payload) in payloads.iter().enumerate() {
            let header = Header {
                version: 2,
                marker: i == payloads.len() - 1,
                payload_type: self.payload_type,
                sequence_number: self.next_seq,
                timestamp: rtp_timestamp,
                ssrc: self.ssrc,
                ..Default::default()
            };
            self.next_seq = self.next_seq.wrapping_add(1);

            let packet = Packet {
                header,
                payload: payload.clone(),
            };
            self.push_retransmit(packet.clone());
            packets.push(packet);
        }

        self.stats.frames_encoded += 1;
        self.stats.frames_sent += 1;
        if is_keyframe {
            self.stats.keyframes_encoded += 1;
        }
        let total_size: usize = payloads.iter().map(|p| p.len()).sum();
        self.stats.bytes_sent += total_size as u64;
        self.stats.packets_sent += packets.len() as u64;
        if expected_size > 0 && total_size as f64 >= expected_size as f64 * HUGE_FRAME_FACTOR {
            self.stats.huge_frames_sent += 1;
        }

        self.first_frame_sent_at.get_or_insert(now);

        packets
    }

    pub fn record_send_failed(&mut self, packets: &[Packet]) {
        self.stats.frames_discarded_on_send += 1;
        self.stats.packets_discarded_on_send += packets.len() as u64;
        self.stats.bytes_discarded_on_send +=
            packets.iter().map(|p| p.payload.len()).sum::<usize>() as u64;
    }

    fn push_retransmit(&mut self, packet: Packet) {
        if self.retransmit_ring.len() == self.retransmit_capacity {
            self.retransmit_ring.pop_front();
        }
        self.retransmit_ring.push_back(packet);
    }

    /// Looks up each sequence number named by a decoded NACK in the
    /// retransmit ring. Sequences that have already fallen out of the ring
    /// are silently skipped.
    pub fn retransmit(&self, sequence_numbers: &[u16]) -> Vec<Packet> {
        sequence_numbers
            .iter()
            .filter_map(|seq| {
                self.retransmit_ring
                    .iter()
                    .find(|p| p.header.sequence_number == *seq)
                    .cloned()
            })
            .collect()
    }

    /// Returns a sender report if one is due: SRTP ready, at least one
    /// frame sent for `SR_MIN_SEND_AGE`, and the 200±100ms timer elapsed.
    pub fn maybe_build_sr(&mut self, now: Instant, ntp_time: u64, jitter_seed: f64) -> Option<SenderReport> {
        let first_sent = self.first_frame_sent_at?;
        if now.duration_since(first_sent) < SR_MIN_SEND_AGE {
            return None;
        }

        let due = match self.last_sr_sent_at {
            None => true,
            Some(last) => {
                let jitter = SR_INTERVAL_JITTER.mul_f64(jitter_seed.clamp(-1.0, 1.0));
                let interval = if jitter_seed >= 0.0 {
                    SR_INTERVAL_BASE + jitter
                } else {
                    SR_INTERVAL_BASE - jitter.abs()
                };
                now.duration_since(last) >= interval
            }
        };
        if !due {
            return None;
        }

        self.last_sr_sent_at = Some(now);
        let elapsed_clock_units =
            (now.duration_since(first_sent).as_secs_f64() * self.clock_rate as f64) as u32;

        Some(SenderReport {
            ssrc: self.ssrc,
            ntp_time,
            rtp_time: elapsed_clock_units,
            packet_count: self.stats.packets_sent as u32,
            octet_count: self.stats.bytes_sent as u32,
            reports: Vec::new(),
            profile_extensions: Bytes::new(),
        })
    }
}

/// Inbound half of a transceiver: one SSRC, one jitter buffer, and the stats
/// the spec tracks on top of it.
pub struct RtpReceiver {
    ssrc: u32,
    jitter_buffer: JitterBuffer,
    stats: ReceiverStats,
    is_video: bool,
}

impl RtpReceiver {
    pub fn new(
        ssrc: u32,
        depay_probe: Box<dyn FrameStartProbe>,
        clock_rate: u32,
        max_latency: u32,
        is_video: bool,
    ) -> Self {
        Self {
            ssrc,
            jitter_buffer: JitterBuffer::new(depay_probe, clock_rate, max_latency),
            stats: ReceiverStats::default(),
            is_video,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn jitter(&self) -> f64 {
        self.jitter_buffer.jitter()
    }

    /// Pushes a successfully-decrypted RTP packet into the jitter buffer.
    pub fn on_packet(&mut self, packet: Packet, arrival_ts_clock_units: u32) {
        if !self.jitter_buffer.push(packet, arrival_ts_clock_units) {
            self.stats.packets_discarded += 1;
        }
    }

    pub fn on_decrypt_failure(&mut self) {
        self.stats.packets_failed_decryption += 1;
    }

    /// Drains whatever frames are ready, updating `framesReceived` for
    /// ready video frames and `packetsDiscarded` for abandoned ones.
    pub fn drain_frames(&mut self, closing: bool) -> Vec<FrameEvent> {
        let events = self.jitter_buffer.pop(closing);
        for event in &events {
            match event.outcome {
                FrameOutcome::Ready => {
                    if self.is_video {
                        self.stats.frames_received += 1;
                    }
                }
                FrameOutcome::Dropped => {
                    let span = event.end_seq.wrapping_sub(event.start_seq) as u64 + 1;
                    self.stats.packets_discarded += span;
                }
            }
        }
        events
    }
}
