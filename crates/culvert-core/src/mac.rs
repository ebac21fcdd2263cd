//! MAC registry — one-time authenticators for the AEAD provider.
//!
//! Each entry is keyed per packet from the keygen cipher's first keystream
//! block, so the registered primitives are one-time authenticators rather
//! than long-lived keyed MACs. The tag covers the common header as
//! associated data and the ciphertext, in the RFC 8439 layout: zero-padded
//! AAD, zero-padded ciphertext, then both lengths as little-endian u64.

use poly1305::universal_hash::{KeyInit, UniversalHash};
use poly1305::{Block, Key, Poly1305};
use subtle::ConstantTimeEq;

/// Tag size shared by the registered authenticators.
pub const TAG_BYTES: usize = 16;

/// Static description of a registered MAC.
#[derive(Debug, PartialEq, Eq)]
pub struct MacInfo {
    pub name: &'static str,
    pub key_length: usize,
    pub tag_length: usize,
}

pub const MACS: &[MacInfo] = &[MacInfo { name: "poly1305", key_length: 32, tag_length: TAG_BYTES }];

/// Look up a MAC by its exact (case-sensitive) name.
pub fn mac_by_name(name: &str) -> Option<&'static MacInfo> {
    MACS.iter().find(|info| info.name == name)
}

/// Compute the tag for one packet. `key` must match the registry entry's
/// key length.
pub fn compute_tag(
    info: &'static MacInfo,
    key: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> [u8; TAG_BYTES] {
    assert_eq!(key.len(), info.key_length, "mac {}: key length mismatch", info.name);
    match info.name {
        "poly1305" => poly1305_tag(key, aad, ciphertext),
        other => panic!("mac {other} is registered but has no implementation"),
    }
}

/// Constant-time tag comparison.
pub fn verify_tag(computed: &[u8; TAG_BYTES], received: &[u8]) -> bool {
    received.len() == TAG_BYTES && bool::from(computed.as_slice().ct_eq(received))
}

fn poly1305_tag(key: &[u8], aad: &[u8], ciphertext: &[u8]) -> [u8; TAG_BYTES] {
    let mut mac = Poly1305::new(Key::from_slice(key));
    mac.update_padded(aad);
    mac.update_padded(ciphertext);

    let mut lengths = Block::default();
    lengths[..8].copy_from_slice(&(aad.len() as u64).to_le_bytes());
    lengths[8..].copy_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    mac.update(core::slice::from_ref(&lengths));

    mac.finalize().into()
}
