use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("peer connection is closed")]
    ErrConnectionClosed,

    #[error("no transceiver for ssrc {0}")]
    ErrNoTransceiverForSsrc(u32),

    #[error("data channel {0} not found")]
    ErrDataChannelNotFound(u16),

    #[error("jitter buffer is closed")]
    ErrJitterBufferClosed,

    #[error("remote description is missing a {0} attribute")]
    ErrMissingSdpAttribute(&'static str),

    #[error("dtls handshake timed out")]
    ErrDtlsHandshakeTimeout,

    #[error("srtp packet failed authentication/decryption")]
    ErrSrtpDecryptFailed,

    #[error("fingerprint mismatch")]
    ErrFingerprintMismatch,

    #[error("{0}")]
    Ice(#[from] ice::Error),
    #[error("{0}")]
    Turn(#[from] turn::error::Error),
    #[error("{0}")]
    Stun(#[from] stun::error::Error),
    #[error("{0}")]
    Rtp(#[from] rtp::Error),
    #[error("{0}")]
    Rtcp(#[from] rtcp::error::Error),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("{0}")]
    Sdp(#[from] sdp::Error),

    #[error("{0}")]
    Other(String),
}
