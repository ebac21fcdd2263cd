//! Error types surfaced by the packet-processing core.
//!
//! Packet-level failures are ordinary values — they are logged, counted,
//! and never propagate past the pipeline glue. Programming-invariant
//! violations (buffer underflow, wrong secret length, unknown cipher at
//! session init) panic instead.

use crate::buffer::Buffer;

/// Why a packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("packet shorter than the common header")]
    ShortPacket,

    #[error("unsupported flags byte: 0x{0:02x}")]
    BadFlags(u8),

    #[error("session is expired or no longer usable")]
    InvalidSession,

    #[error("authentication tag mismatch")]
    AuthFailure,

    #[error("nonce parity does not match the remote role")]
    BadNonceParity,

    #[error("nonce was already accepted")]
    Replay,

    #[error("nonce fell below the replay window")]
    TooOld,

    #[error("send nonce space exhausted")]
    NonceExhausted,

    #[error("cipher primitive failed")]
    CipherFailure,
}

/// A failed decryption, handing the untouched input back to the caller.
///
/// The pipeline uses the returned buffer to retry against the peer's
/// previous session before counting the packet as dropped.
#[derive(Debug)]
pub struct DecryptFailure {
    pub input: Buffer,
    pub error: PacketError,
}

impl DecryptFailure {
    pub fn new(input: Buffer, error: PacketError) -> Self {
        Self { input, error }
    }
}
