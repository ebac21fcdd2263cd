//! Method providers — the pluggable cipher suites driving packet
//! encryption and decryption.
//!
//! The provider set is fixed at compile time, so dispatch is a closed enum
//! rather than a trait object: [`Method`] describes a configured suite,
//! [`Session`] holds the keyed per-session state. Two providers exist:
//!
//! - `aead` — authenticated encryption, the production provider.
//! - `cipher-test` — raw stream cipher without authentication, for
//!   benchmarking the cipher primitive only.

mod aead;

pub use aead::{AeadMethod, AeadSession};
pub use cipher_test::{CipherTestMethod, CipherTestSession};

use crate::buffer::Buffer;
use crate::common::{CommonState, PacketHeader, SessionParams, Timestamp};
use crate::error::{DecryptFailure, PacketError};

/// A configured cipher-suite descriptor.
#[derive(Debug)]
pub enum Method {
    Aead(AeadMethod),
    CipherTest(CipherTestMethod),
}

impl Method {
    /// Parse a full suite name, e.g. `"salsa2012+poly1305+aead"` or
    /// `"null+cipher-test"`. Returns `None` if no provider recognises it.
    pub fn from_name(name: &str) -> Option<Method> {
        if let Some(method) = AeadMethod::from_name(name) {
            return Some(Method::Aead(method));
        }
        if let Some(method) = CipherTestMethod::from_name(name) {
            return Some(Method::CipherTest(method));
        }
        None
    }

    pub fn name(&self) -> &str {
        match self {
            Method::Aead(m) => m.name(),
            Method::CipherTest(m) => m.name(),
        }
    }

    /// Bytes of key material the handshake must deliver.
    pub fn key_length(&self) -> usize {
        match self {
            Method::Aead(m) => m.key_length(),
            Method::CipherTest(m) => m.key_length(),
        }
    }

    /// Net bytes added to a packet by `encrypt`.
    pub fn overhead(&self) -> usize {
        match self {
            Method::Aead(m) => m.overhead(),
            Method::CipherTest(m) => m.overhead(),
        }
    }

    /// Head space `encrypt` inputs must reserve.
    pub fn encrypt_headroom(&self) -> usize {
        match self {
            Method::Aead(m) => m.encrypt_headroom(),
            Method::CipherTest(_) => 0,
        }
    }

    /// Head space `decrypt` inputs must reserve.
    pub fn decrypt_headroom(&self) -> usize {
        match self {
            Method::Aead(m) => m.decrypt_headroom(),
            Method::CipherTest(_) => 0,
        }
    }

    /// Tail space `encrypt` and `decrypt` inputs must reserve.
    pub fn tailroom(&self) -> usize {
        match self {
            Method::Aead(m) => m.tailroom(),
            Method::CipherTest(m) => m.tailroom(),
        }
    }

    /// Largest wire datagram produced for a given payload limit.
    pub fn max_packet_size(&self, max_payload: usize) -> usize {
        max_payload + self.overhead()
    }

    /// Build session state from handshake key material.
    ///
    /// Panics if `secret` is not exactly [`Method::key_length`] bytes —
    /// the handshake contract fixes the length, so a mismatch is a bug.
    pub fn session_init(
        &self,
        secret: &[u8],
        initiator: bool,
        params: &SessionParams,
        now: Timestamp,
    ) -> Session {
        match self {
            Method::Aead(m) => Session::Aead(m.session_init(secret, initiator, params, now)),
            Method::CipherTest(m) => {
                Session::CipherTest(m.session_init(secret, initiator, params, now))
            }
        }
    }
}

/// Keyed per-session state for one provider.
#[derive(Debug)]
pub enum Session {
    Aead(AeadSession),
    CipherTest(CipherTestSession),
}

/// Successful decryption outcome.
#[derive(Debug)]
pub enum Decrypted {
    /// The plaintext, and whether the packet arrived out of order.
    Accepted { buffer: Buffer, reordered: bool },
    /// Authentic, but the replay window had already accepted the nonce —
    /// the plaintext is discarded. Upstream must not retry another
    /// session: the packet was genuine.
    Stale,
}

impl Session {
    fn common(&self) -> &CommonState {
        match self {
            Session::Aead(s) => s.common(),
            Session::CipherTest(s) => s.common(),
        }
    }

    fn common_mut(&mut self) -> &mut CommonState {
        match self {
            Session::Aead(s) => s.common_mut(),
            Session::CipherTest(s) => s.common_mut(),
        }
    }

    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.common().is_valid(now)
    }

    pub fn is_initiator(&self) -> bool {
        self.common().is_initiator()
    }

    pub fn want_refresh(&self, now: Timestamp) -> bool {
        self.common().want_refresh(now)
    }

    pub fn is_superseded(&self) -> bool {
        self.common().is_superseded()
    }

    pub fn mark_superseded(&mut self) {
        self.common_mut().mark_superseded();
    }

    /// Consume a plaintext buffer and produce the framed ciphertext.
    ///
    /// The input must carry the method's `encrypt_headroom` and `tailroom`.
    /// Fails only on nonce exhaustion (terminal) or a cipher-primitive
    /// failure; the send counter advances on success alone.
    pub fn encrypt(&mut self, input: Buffer) -> Result<Buffer, PacketError> {
        match self {
            Session::Aead(s) => s.encrypt(input),
            Session::CipherTest(s) => s.encrypt(input),
        }
    }

    /// Consume a wire datagram and recover the plaintext.
    ///
    /// On failure the input buffer is handed back untouched so the caller
    /// can retry against the peer's previous session.
    pub fn decrypt(&mut self, now: Timestamp, input: Buffer) -> Result<Decrypted, DecryptFailure> {
        match self {
            Session::Aead(s) => s.decrypt(now, input),
            Session::CipherTest(s) => s.decrypt(now, input),
        }
    }

    /// Overrides the send counter. Test support for exercising counter
    /// exhaustion.
    #[doc(hidden)]
    pub fn preload_send_nonce(&mut self, nonce: u64) {
        self.common_mut().preload_send_nonce(nonce);
    }
}

/// Stateless pre-authentication checks shared by both providers: packet
/// length, header flags, session validity, and nonce parity. Returns the
/// header nonce. Never touches the replay window.
fn check_common_header(
    common: &CommonState,
    input: &Buffer,
    minimum_len: usize,
    now: Timestamp,
) -> Result<u64, PacketError> {
    if input.len() < minimum_len {
        return Err(PacketError::ShortPacket);
    }
    let header = PacketHeader::parse(input.data()).ok_or(PacketError::ShortPacket)?;
    header.check_flags()?;
    if !common.is_valid(now) {
        return Err(PacketError::InvalidSession);
    }
    let nonce = header.nonce_value();
    if !common.check_nonce_parity(nonce) {
        return Err(PacketError::BadNonceParity);
    }
    Ok(nonce)
}
