//! Wire shapes for the signaling WebSocket channel, per the AWS KVS
//! signaling-service JSON protocol.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "SDP_OFFER")]
    SdpOffer,
    #[serde(rename = "SDP_ANSWER")]
    SdpAnswer,
    #[serde(rename = "ICE_CANDIDATE")]
    IceCandidate,
}

pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024;

/// An outbound signaling message, built by the caller and base64-encoded by
/// `OutboundMessage::encode` before going on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub action: Action,
    #[serde(rename = "RecipientClientId")]
    pub recipient_client_id: String,
    #[serde(rename = "MessagePayload")]
    pub message_payload: String,
    #[serde(rename = "CorrelationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl OutboundMessage {
    pub fn new(
        action: Action,
        recipient_client_id: impl Into<String>,
        payload: &[u8],
        correlation_id: Option<String>,
    ) -> Self {
        use base64::Engine;
        Self {
            action,
            recipient_client_id: recipient_client_id.into(),
            message_payload: base64::engine::general_purpose::STANDARD.encode(payload),
            correlation_id,
        }
    }
}

/// KVS-internal control sentinels modeled as explicit enum variants rather
/// than magic status codes, alongside the ordinary signaling message types.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    SdpOffer {
        sender_client_id: String,
        payload: Vec<u8>,
    },
    SdpAnswer {
        sender_client_id: String,
        payload: Vec<u8>,
    },
    IceCandidate {
        sender_client_id: String,
        payload: Vec<u8>,
    },
    StatusResponse {
        correlation_id: Option<String>,
        status: ApiCallStatus,
        description: String,
    },
    GoAway,
    ReconnectIceServer,
    /// Synthetic message posted by the listener task when the socket closes,
    /// so the dispatch task observes it through the same queue.
    CtrlClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCallStatus {
    Ok,
    GoAway,
    ReconnectIceServer,
    Error(u16),
}

impl From<u16> for ApiCallStatus {
    fn from(code: u16) -> Self {
        match code {
            200 => ApiCallStatus::Ok,
            _ => ApiCallStatus::Error(code),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "action")]
    action: Option<String>,
    #[serde(rename = "senderClientId", default)]
    sender_client_id: String,
    #[serde(rename = "messagePayload", default)]
    message_payload: String,
    #[serde(rename = "statusResponse", default)]
    status_response: Option<RawStatusResponse>,
}

#[derive(Debug, Deserialize)]
struct RawStatusResponse {
    #[serde(rename = "correlationId", default)]
    correlation_id: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(rename = "description", default)]
    description: String,
}

/// Parses one inbound WebSocket text frame into a typed message, enforcing
/// the non-empty-sender-id and payload-size rules for OFFER/ANSWER/
/// ICE_CANDIDATE frames.
pub fn parse_inbound(text: &str) -> crate::error::Result<InboundMessage> {
    let raw: RawInbound = serde_json::from_str(text)?;

    if let Some(status) = raw.status_response {
        return Ok(InboundMessage::StatusResponse {
            correlation_id: status.correlation_id,
            status: ApiCallStatus::from(status.status_code),
            description: status.description,
        });
    }

    match raw.action.as_deref() {
        Some("GO_AWAY") => Ok(InboundMessage::GoAway),
        Some("RECONNECT_ICE_SERVER") => Ok(InboundMessage::ReconnectIceServer),
        Some(action @ ("SDP_OFFER" | "SDP_ANSWER" | "ICE_CANDIDATE")) => {
            if raw.sender_client_id.is_empty() {
                return Err(crate::error::Error::Other(
                    "inbound message missing senderClientId".to_owned(),
                ));
            }
            use base64::Engine;
            let payload = base64::engine::general_purpose::STANDARD
                .decode(raw.message_payload.as_bytes())
                .map_err(|e| crate::error::Error::Other(e.to_string()))?;
            if payload.len() > MAX_PAYLOAD_BYTES {
                return Err(crate::error::Error::PayloadTooLarge);
            }
            let sender_client_id = raw.sender_client_id;
            Ok(match action {
                "SDP_OFFER" => InboundMessage::SdpOffer {
                    sender_client_id,
                    payload,
                },
                "SDP_ANSWER" => InboundMessage::SdpAnswer {
                    sender_client_id,
                    payload,
                },
                _ => InboundMessage::IceCandidate {
                    sender_client_id,
                    payload,
                },
            })
        }
        other => Err(crate::error::Error::Other(format!(
            "unrecognized inbound signaling action: {other:?}"
        ))),
    }
}
