//! Dispatches a decoded compound RTCP datagram to per-SSRC transceiver stats
//! and retransmission, in packet order within the compound packet.

use rtcp::header::{FORMAT_FIR, FORMAT_PLI, FORMAT_REMB, FORMAT_SLI};
use rtcp::packet::Packet as RtcpPacket;
use rtcp::payload_feedbacks::full_intra_request::FullIntraRequest;
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use rtcp::payload_feedbacks::slice_loss_indication::SliceLossIndication;
use rtcp::receiver_report::ReceiverReport;
use rtcp::sender_report::SenderReport;
use rtcp::transport_feedbacks::transport_layer_nack::TransportLayerNack;

use crate::error::Result;

/// One event per recognized RTCP packet in the compound datagram. `Logged`
/// packets (BYE/SDES/APP, and any PSFB/RTPFB format this implementation
/// doesn't decode) are reported but never acted on.
#[derive(Debug, Clone)]
pub enum RtcpEvent {
    SenderReport {
        ssrc: u32,
        ntp_time: u64,
        rtp_time: u32,
        packet_count: u32,
        octet_count: u32,
    },
    ReceiverReport {
        ssrc: u32,
        fraction_lost: Vec<u8>,
    },
    Nack {
        sender_ssrc: u32,
        media_ssrc: u32,
        lost_sequence_numbers: Vec<u16>,
    },
    PictureLoss {
        media_ssrc: u32,
    },
    SliceLoss {
        media_ssrc: u32,
    },
    BandwidthEstimation {
        ssrcs: Vec<u32>,
        bitrate_bps: u64,
    },
    FullIntraRequest {
        media_ssrc: u32,
    },
    Logged,
}

pub fn dispatch(compound: &mut [u8]) -> Result<Vec<RtcpEvent>> {
    let mut buf = bytes::Bytes::copy_from_slice(compound);
    let packets = rtcp::packet::unmarshal(&mut buf)?;

    Ok(packets.iter().map(|packet| classify(packet.as_ref())).collect())
}

fn classify(packet: &(dyn RtcpPacket + Send + Sync)) -> RtcpEvent {
    let any = packet.as_any();

    if let Some(sr) = any.downcast_ref::<SenderReport>() {
        return RtcpEvent::SenderReport {
            ssrc: sr.ssrc,
            ntp_time: sr.ntp_time,
            rtp_time: sr.rtp_time,
            packet_count: sr.packet_count,
            octet_count: sr.octet_count,
        };
    }

    if let Some(rr) = any.downcast_ref::<ReceiverReport>() {
        return RtcpEvent::ReceiverReport {
            ssrc: rr.ssrc,
            fraction_lost: rr.reports.iter().map(|r| r.fraction_lost).collect(),
        };
    }

    if let Some(nack) = any.downcast_ref::<TransportLayerNack>() {
        let lost_sequence_numbers = nack
            .nacks
            .iter()
            .flat_map(|pair| pair.packet_list())
            .collect();
        return RtcpEvent::Nack {
            sender_ssrc: nack.sender_ssrc,
            media_ssrc: nack.media_ssrc,
            lost_sequence_numbers,
        };
    }

    if let Some(pli) = any.downcast_ref::<PictureLossIndication>() {
        let _ = FORMAT_PLI;
        return RtcpEvent::PictureLoss {
            media_ssrc: pli.media_ssrc,
        };
    }

    if let Some(sli) = any.downcast_ref::<SliceLossIndication>() {
        let _ = FORMAT_SLI;
        return RtcpEvent::SliceLoss {
            media_ssrc: sli.media_ssrc,
        };
    }

    if let Some(remb) = any.downcast_ref::<ReceiverEstimatedMaximumBitrate>() {
        let _ = FORMAT_REMB;
        return RtcpEvent::BandwidthEstimation {
            ssrcs: remb.ssrcs.clone(),
            bitrate_bps: (remb.bitrate) as u64,
        };
    }

    if let Some(fir) = any.downcast_ref::<FullIntraRequest>() {
        let _ = FORMAT_FIR;
        return RtcpEvent::FullIntraRequest {
            media_ssrc: fir.media_ssrc,
        };
    }

    RtcpEvent::Logged
}
