//! Cipher registry — the primitive stream ciphers available to the method
//! providers.
//!
//! The table is fixed at compile time and looked up by exact name. Every
//! entry is a stream cipher, so the same `crypt` call encrypts and
//! decrypts. The `null` entry passes data through unchanged; it exists for
//! suites that authenticate without encrypting and for benchmarking.

use std::fmt;

use salsa20::cipher::{Iv, Key, KeyIvInit, StreamCipher};
use salsa20::{Salsa12, Salsa20};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::PacketError;

/// Static description of a registered cipher.
#[derive(Debug, PartialEq, Eq)]
pub struct CipherInfo {
    pub name: &'static str,
    pub key_length: usize,
    pub iv_length: usize,
    pub block_size: usize,
}

/// The process-wide cipher table. Registration is fixed at startup; there
/// is no dynamic loading.
pub const CIPHERS: &[CipherInfo] = &[
    CipherInfo { name: "null", key_length: 0, iv_length: 0, block_size: 1 },
    CipherInfo { name: "salsa20", key_length: 32, iv_length: 8, block_size: 64 },
    CipherInfo { name: "salsa2012", key_length: 32, iv_length: 8, block_size: 64 },
];

/// Largest IV length among the registered ciphers; callers size IV
/// scratch arrays with this.
pub const MAX_IV_BYTES: usize = 8;

/// Look up a cipher by its exact (case-sensitive) name.
pub fn cipher_by_name(name: &str) -> Option<&'static CipherInfo> {
    CIPHERS.iter().find(|info| info.name == name)
}

/// A keyed instance of a registry cipher. Key material is wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub enum CipherState {
    Null,
    Salsa20 { key: [u8; 32] },
    Salsa2012 { key: [u8; 32] },
}

impl CipherState {
    /// Build a cipher state from raw key material.
    ///
    /// Panics if the key length does not match the registry entry — key
    /// sizing is fixed by the method's `key_length` contract, so a
    /// mismatch here is a bug in the caller, not a runtime condition.
    pub fn init(info: &'static CipherInfo, key: &[u8]) -> CipherState {
        assert_eq!(
            key.len(),
            info.key_length,
            "cipher {}: key length mismatch",
            info.name
        );
        match info.name {
            "null" => CipherState::Null,
            "salsa20" => CipherState::Salsa20 { key: key.try_into().unwrap() },
            "salsa2012" => CipherState::Salsa2012 { key: key.try_into().unwrap() },
            other => panic!("cipher {other} is registered but has no implementation"),
        }
    }

    pub fn info(&self) -> &'static CipherInfo {
        let name = match self {
            CipherState::Null => "null",
            CipherState::Salsa20 { .. } => "salsa20",
            CipherState::Salsa2012 { .. } => "salsa2012",
        };
        cipher_by_name(name).unwrap()
    }

    /// Apply the keystream for `iv` to `input`, writing into `out`. The
    /// slices must have equal length; `iv` must match the registered IV
    /// length.
    pub fn crypt(&self, out: &mut [u8], input: &[u8], iv: &[u8]) -> Result<(), PacketError> {
        assert_eq!(out.len(), input.len(), "crypt: length mismatch");
        match self {
            CipherState::Null => {
                out.copy_from_slice(input);
                Ok(())
            }
            CipherState::Salsa20 { key } => apply::<Salsa20>(key, iv, out, input),
            CipherState::Salsa2012 { key } => apply::<Salsa12>(key, iv, out, input),
        }
    }
}

// Key material stays out of debug output.
impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CipherState::Null => "CipherState(null)",
            CipherState::Salsa20 { .. } => "CipherState(salsa20)",
            CipherState::Salsa2012 { .. } => "CipherState(salsa2012)",
        })
    }
}

fn apply<C: KeyIvInit + StreamCipher>(
    key: &[u8],
    iv: &[u8],
    out: &mut [u8],
    input: &[u8],
) -> Result<(), PacketError> {
    let mut cipher = C::new(Key::<C>::from_slice(key), Iv::<C>::from_slice(iv));
    cipher
        .apply_keystream_b2b(input, out)
        .map_err(|_| PacketError::CipherFailure)
}
