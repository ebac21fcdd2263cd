//! The `aead` method provider — authenticated encryption with the common
//! header as associated data.
//!
//! Wire layout per packet:
//!
//! ```text
//! [ nonce(6) | flags(1) | reserved(1) | ciphertext(L) | tag(16) ]
//! ```
//!
//! Suite names follow `<cipher>+<mac>+aead`. In the single-cipher form
//! (`salsa2012+poly1305+aead`) one cipher both keys the authenticator —
//! from keystream block 0 — and encrypts the payload from the following
//! block. In the split form (`null+salsa2012+poly1305+aead`) the first
//! cipher transforms the payload while the second exists only to key the
//! authenticator.

use tracing::trace;
use zerocopy::AsBytes;

use crate::buffer::Buffer;
use crate::cipher::{cipher_by_name, CipherInfo, CipherState, MAX_IV_BYTES};
use crate::common::{
    expand_nonce, CommonState, PacketHeader, SessionParams, Timestamp, WindowVerdict,
    HEADER_BYTES,
};
use crate::error::{DecryptFailure, PacketError};
use crate::mac::{compute_tag, mac_by_name, verify_tag, MacInfo};

use super::{check_common_header, Decrypted};

/// One keygen keystream block: the first 32 bytes key the authenticator,
/// the rest is discarded, and in the single-cipher form the payload
/// keystream starts at the next block.
const KEYSTREAM_PREFIX: usize = 64;

/// A parsed `<cipher>+<mac>+aead` suite.
#[derive(Debug)]
pub struct AeadMethod {
    name: String,
    payload_cipher: &'static CipherInfo,
    keygen_cipher: &'static CipherInfo,
    mac: &'static MacInfo,
}

impl AeadMethod {
    pub fn from_name(name: &str) -> Option<AeadMethod> {
        let inner = name.strip_suffix("+aead")?;
        let parts: Vec<&str> = inner.split('+').collect();
        let (payload_name, keygen_name, mac_name) = match parts.as_slice() {
            [cipher, mac] => (*cipher, *cipher, *mac),
            [payload, keygen, mac] => (*payload, *keygen, *mac),
            _ => return None,
        };
        let payload_cipher = cipher_by_name(payload_name)?;
        let keygen_cipher = cipher_by_name(keygen_name)?;
        let mac = mac_by_name(mac_name)?;
        // The authenticator key is drawn from the keygen keystream, so a
        // keyless cipher cannot fill that role.
        if keygen_cipher.key_length == 0 {
            return None;
        }
        Some(AeadMethod { name: name.to_owned(), payload_cipher, keygen_cipher, mac })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_split(&self) -> bool {
        self.payload_cipher.name != self.keygen_cipher.name
    }

    /// Key material: payload-cipher key first, keygen-cipher key second.
    /// The single-cipher form shares one key between both roles.
    pub fn key_length(&self) -> usize {
        if self.is_split() {
            self.payload_cipher.key_length + self.keygen_cipher.key_length
        } else {
            self.keygen_cipher.key_length
        }
    }

    pub fn overhead(&self) -> usize {
        HEADER_BYTES + self.mac.tag_length
    }

    pub fn encrypt_headroom(&self) -> usize {
        if self.is_split() {
            0
        } else {
            KEYSTREAM_PREFIX
        }
    }

    pub fn decrypt_headroom(&self) -> usize {
        if self.is_split() {
            0
        } else {
            KEYSTREAM_PREFIX - HEADER_BYTES
        }
    }

    pub fn tailroom(&self) -> usize {
        self.mac.tag_length
    }

    /// Panics if `secret` is not exactly [`AeadMethod::key_length`] bytes.
    pub fn session_init(
        &self,
        secret: &[u8],
        initiator: bool,
        params: &SessionParams,
        now: Timestamp,
    ) -> AeadSession {
        assert_eq!(
            secret.len(),
            self.key_length(),
            "aead: session secret has the wrong length"
        );
        let (payload_key, keygen_key) = if self.is_split() {
            secret.split_at(self.payload_cipher.key_length)
        } else {
            (secret, secret)
        };
        AeadSession {
            common: CommonState::new(params, initiator, now),
            payload: CipherState::init(self.payload_cipher, payload_key),
            keygen: CipherState::init(self.keygen_cipher, keygen_key),
            mac: self.mac,
            split: self.is_split(),
        }
    }
}

/// Keyed session state for the `aead` provider.
#[derive(Debug)]
pub struct AeadSession {
    common: CommonState,
    payload: CipherState,
    keygen: CipherState,
    mac: &'static MacInfo,
    split: bool,
}

impl AeadSession {
    pub(super) fn common(&self) -> &CommonState {
        &self.common
    }

    pub(super) fn common_mut(&mut self) -> &mut CommonState {
        &mut self.common
    }

    /// First 32 keystream bytes of the keygen cipher for this nonce.
    fn tag_key(&self, iv: &[u8]) -> Result<[u8; 32], PacketError> {
        let zeros = [0u8; 32];
        let mut key = [0u8; 32];
        self.keygen.crypt(&mut key, &zeros, iv)?;
        Ok(key)
    }

    pub(super) fn encrypt(&mut self, mut input: Buffer) -> Result<Buffer, PacketError> {
        let nonce = self.common.next_send_nonce()?;
        let tag_len = self.mac.tag_length;

        let mut iv = [0u8; MAX_IV_BYTES];
        let iv_len = self.keygen.info().iv_length;
        expand_nonce(nonce, &mut iv[..iv_len]);

        let mut out;
        let tag_key;
        if self.split {
            out = Buffer::alloc(input.len(), HEADER_BYTES, tag_len);
            let payload_iv_len = self.payload.info().iv_length;
            let mut payload_iv = [0u8; MAX_IV_BYTES];
            expand_nonce(nonce, &mut payload_iv[..payload_iv_len]);
            self.payload
                .crypt(out.data_mut(), input.data(), &payload_iv[..payload_iv_len])?;
            tag_key = self.tag_key(&iv[..iv_len])?;
            out.pull_head(HEADER_BYTES);
        } else {
            // Zeroed-prefix pass: one keystream application yields the
            // authenticator key in the first block and the ciphertext
            // beyond it, with no keystream reuse.
            input.pull_head(KEYSTREAM_PREFIX);
            input.data_mut()[..KEYSTREAM_PREFIX].fill(0);
            out = Buffer::alloc(input.len(), 0, tag_len);
            self.keygen.crypt(out.data_mut(), input.data(), &iv[..iv_len])?;
            let mut key = [0u8; 32];
            key.copy_from_slice(&out.data()[..32]);
            tag_key = key;
            out.push_head(KEYSTREAM_PREFIX - HEADER_BYTES);
        }

        let header = PacketHeader::new(nonce);
        out.data_mut()[..HEADER_BYTES].copy_from_slice(header.as_bytes());

        let (aad, ciphertext) = out.data().split_at(HEADER_BYTES);
        let tag = compute_tag(self.mac, &tag_key, aad, ciphertext);
        out.extend_tail(tag_len);
        let total = out.len();
        out.data_mut()[total - tag_len..].copy_from_slice(&tag);

        self.common.advance_send_nonce();
        Ok(out)
    }

    pub(super) fn decrypt(
        &mut self,
        now: Timestamp,
        mut input: Buffer,
    ) -> Result<Decrypted, DecryptFailure> {
        let tag_len = self.mac.tag_length;
        let nonce = match check_common_header(&self.common, &input, HEADER_BYTES + tag_len, now) {
            Ok(nonce) => nonce,
            Err(error) => return Err(DecryptFailure::new(input, error)),
        };

        let iv_len = self.keygen.info().iv_length;
        let mut iv = [0u8; MAX_IV_BYTES];
        expand_nonce(nonce, &mut iv[..iv_len]);

        // Authenticate before touching receiver state or the input window:
        // a forged packet must never perturb either.
        let tag_key = match self.tag_key(&iv[..iv_len]) {
            Ok(key) => key,
            Err(error) => return Err(DecryptFailure::new(input, error)),
        };
        let ct_len = input.len() - HEADER_BYTES - tag_len;
        {
            let data = input.data();
            let (aad, rest) = data.split_at(HEADER_BYTES);
            let (ciphertext, received) = rest.split_at(ct_len);
            let expected = compute_tag(self.mac, &tag_key, aad, ciphertext);
            if !verify_tag(&expected, received) {
                return Err(DecryptFailure::new(input, PacketError::AuthFailure));
            }
        }

        let mut out;
        if self.split {
            let payload_iv_len = self.payload.info().iv_length;
            let mut payload_iv = [0u8; MAX_IV_BYTES];
            expand_nonce(nonce, &mut payload_iv[..payload_iv_len]);
            out = Buffer::alloc(ct_len, 0, 0);
            if let Err(error) = self.payload.crypt(
                out.data_mut(),
                &input.data()[HEADER_BYTES..HEADER_BYTES + ct_len],
                &payload_iv[..payload_iv_len],
            ) {
                return Err(DecryptFailure::new(input, error));
            }
        } else {
            // Rebuild the zeroed prefix in front of the ciphertext; the
            // decrypt headroom the provider advertises covers it.
            input.truncate(HEADER_BYTES + ct_len);
            input.push_head(HEADER_BYTES);
            input.pull_head(KEYSTREAM_PREFIX);
            input.data_mut()[..KEYSTREAM_PREFIX].fill(0);
            out = Buffer::alloc(input.len(), 0, 0);
            if let Err(error) = self.keygen.crypt(out.data_mut(), input.data(), &iv[..iv_len]) {
                // Restore the caller's view of the datagram.
                input.push_head(KEYSTREAM_PREFIX);
                input.pull_head(HEADER_BYTES);
                input.extend_tail(tag_len);
                input.data_mut()[..HEADER_BYTES]
                    .copy_from_slice(PacketHeader::new(nonce).as_bytes());
                return Err(DecryptFailure::new(input, error));
            }
            out.push_head(KEYSTREAM_PREFIX);
        }

        // The replay window is consulted only now, after authentication.
        match self.common.accept_nonce(nonce) {
            WindowVerdict::Fresh => Ok(Decrypted::Accepted { buffer: out, reordered: false }),
            WindowVerdict::Reordered { age } => {
                trace!(nonce, age, "accepted reordered packet");
                Ok(Decrypted::Accepted { buffer: out, reordered: true })
            }
            WindowVerdict::Replay => {
                trace!(nonce, "authentic replay discarded");
                Ok(Decrypted::Stale)
            }
            WindowVerdict::TooOld => {
                trace!(nonce, "authentic packet below the replay window");
                Ok(Decrypted::Stale)
            }
        }
    }
}
