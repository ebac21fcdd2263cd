//! State shared by every method provider: the on-wire common header, the
//! 48-bit send counter, the sliding replay window, and session validity
//! timers.
//!
//! The header layout IS the protocol. Every field, every reserved byte is
//! part of the wire format:
//!
//! ```text
//! +0  : nonce[6]     big-endian 48-bit
//! +6  : flags        u8   (must be 0)
//! +7  : reserved     u8   (must be 0)
//! ```

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::PacketError;

/// Size of the common packet header.
pub const HEADER_BYTES: usize = 8;

/// Size of the on-wire nonce.
pub const NONCE_BYTES: usize = 6;

/// Largest value the 48-bit nonce counter can hold.
pub const NONCE_MAX: u64 = (1 << 48) - 1;

/// Number of nonce positions the replay window remembers.
pub const WINDOW_WIDTH: u64 = 64;

/// Flag bits this protocol revision understands. Packets carrying any
/// other bit are rejected; future revisions widen this constant.
pub const SUPPORTED_FLAGS: u8 = 0;

// ── Timestamps ────────────────────────────────────────────────────────────────

/// A monotonic timestamp in milliseconds.
///
/// The core never reads a clock. The embedding event loop refreshes the
/// current time once per tick and passes it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn add_millis(self, ms: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(ms))
    }

    pub fn add_secs(self, secs: u64) -> Timestamp {
        self.add_millis(secs.saturating_mul(1000))
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// ── Header codec ──────────────────────────────────────────────────────────────

/// The common header prepended to every data packet.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PacketHeader {
    /// Big-endian 48-bit nonce.
    pub nonce: [u8; NONCE_BYTES],
    pub flags: u8,
    pub reserved: u8,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(PacketHeader, [u8; HEADER_BYTES]);

impl PacketHeader {
    pub fn new(nonce: u64) -> PacketHeader {
        PacketHeader {
            nonce: encode_nonce(nonce),
            flags: 0,
            reserved: 0,
        }
    }

    /// Read a header from the start of a packet. `None` if the packet is
    /// shorter than the header.
    pub fn parse(data: &[u8]) -> Option<PacketHeader> {
        PacketHeader::read_from_prefix(data)
    }

    pub fn nonce_value(&self) -> u64 {
        decode_nonce(&self.nonce)
    }

    /// Non-zero flag or reserved bits make the packet unintelligible to
    /// this protocol revision.
    pub fn check_flags(&self) -> Result<(), PacketError> {
        if self.flags & !SUPPORTED_FLAGS != 0 || self.reserved != 0 {
            return Err(PacketError::BadFlags(self.flags | self.reserved));
        }
        Ok(())
    }
}

/// Encode a 48-bit nonce big-endian. Values above [`NONCE_MAX`] are a
/// counter-management bug.
pub fn encode_nonce(nonce: u64) -> [u8; NONCE_BYTES] {
    debug_assert!(nonce <= NONCE_MAX);
    let bytes = nonce.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

pub fn decode_nonce(bytes: &[u8; NONCE_BYTES]) -> u64 {
    let mut wide = [0u8; 8];
    wide[2..].copy_from_slice(bytes);
    u64::from_be_bytes(wide)
}

/// Expand a nonce counter into a cipher IV: little-endian in the low
/// bytes, zero beyond. The wire keeps big-endian order; both ends derive
/// the IV from the same counter value.
pub fn expand_nonce(nonce: u64, iv: &mut [u8]) {
    let bytes = nonce.to_le_bytes();
    for (i, slot) in iv.iter_mut().enumerate() {
        *slot = if i < 8 { bytes[i] } else { 0 };
    }
}

// ── Replay window ─────────────────────────────────────────────────────────────

/// Outcome of offering a nonce to the replay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Newest nonce seen so far.
    Fresh,
    /// Within the window and not yet seen; `age` is the number of strides
    /// behind the newest accepted nonce.
    Reordered { age: u64 },
    /// Already accepted once.
    Replay,
    /// Below the window entirely.
    TooOld,
}

/// Sliding-window duplicate suppression over the stride-2 nonce space.
///
/// Bit `i` of the bitmap records that `max_nonce - 2 * i` has been
/// accepted. Reordering within [`WINDOW_WIDTH`] strides is tolerated;
/// duplicates and older packets are rejected.
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    max_nonce: u64,
    bitmap: u64,
}

impl ReplayWindow {
    pub fn new() -> ReplayWindow {
        ReplayWindow::default()
    }

    /// True until the first nonce has been accepted.
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0
    }

    pub fn max_nonce(&self) -> u64 {
        self.max_nonce
    }

    /// Offer a nonce. Accepting mutates the window; `Replay` and `TooOld`
    /// leave it untouched.
    pub fn accept(&mut self, nonce: u64) -> WindowVerdict {
        if self.bitmap == 0 {
            self.max_nonce = nonce;
            self.bitmap = 1;
            return WindowVerdict::Fresh;
        }

        if nonce > self.max_nonce {
            let shift = (nonce - self.max_nonce) / 2;
            self.bitmap = if shift >= WINDOW_WIDTH {
                0
            } else {
                self.bitmap << shift
            };
            self.bitmap |= 1;
            self.max_nonce = nonce;
            return WindowVerdict::Fresh;
        }

        let offset = (self.max_nonce - nonce) / 2;
        if offset >= WINDOW_WIDTH {
            return WindowVerdict::TooOld;
        }
        if self.bitmap & (1 << offset) != 0 {
            return WindowVerdict::Replay;
        }
        self.bitmap |= 1 << offset;
        WindowVerdict::Reordered { age: offset }
    }
}

// ── Session common state ──────────────────────────────────────────────────────

/// Timing and refresh thresholds for a new session, resolved by the
/// tunnel context from its configuration (jitter already applied).
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Milliseconds until the session must stop sending.
    pub valid_for: u64,
    /// Milliseconds until a refresh should be requested.
    pub refresh_after: u64,
    /// Send-counter value past which a refresh should be requested.
    pub refresh_after_packets: u64,
}

/// Per-session state every method provider shares: the send counter, the
/// replay window, validity timers, and role/supersession markers.
#[derive(Debug)]
pub struct CommonState {
    initiator: bool,
    send_nonce: u64,
    window: ReplayWindow,
    valid_till: Timestamp,
    refresh_at: Timestamp,
    refresh_after_packets: u64,
    superseded: bool,
    exhausted: bool,
}

impl CommonState {
    /// The initiator consumes odd nonces starting at 1, the responder even
    /// nonces starting at 0; both advance by 2, sharing the 48-bit space
    /// without collision.
    pub fn new(params: &SessionParams, initiator: bool, now: Timestamp) -> CommonState {
        CommonState {
            initiator,
            send_nonce: if initiator { 1 } else { 0 },
            window: ReplayWindow::new(),
            valid_till: now.add_millis(params.valid_for),
            refresh_at: now.add_millis(params.refresh_after),
            refresh_after_packets: params.refresh_after_packets,
            superseded: false,
            exhausted: false,
        }
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    pub fn mark_superseded(&mut self) {
        self.superseded = true;
    }

    pub fn is_valid(&self, now: Timestamp) -> bool {
        !self.exhausted && now <= self.valid_till
    }

    pub fn want_refresh(&self, now: Timestamp) -> bool {
        self.exhausted || now >= self.refresh_at || self.send_nonce >= self.refresh_after_packets
    }

    pub fn send_nonce(&self) -> u64 {
        self.send_nonce
    }

    /// The nonce for the next outbound packet.
    ///
    /// Once the increment would overflow 48 bits the session is
    /// permanently invalidated; the peer must renegotiate.
    pub fn next_send_nonce(&mut self) -> Result<u64, PacketError> {
        if self.exhausted || self.send_nonce > NONCE_MAX - 2 {
            self.exhausted = true;
            return Err(PacketError::NonceExhausted);
        }
        Ok(self.send_nonce)
    }

    /// Commit the nonce returned by [`CommonState::next_send_nonce`] after
    /// a successful encrypt.
    pub fn advance_send_nonce(&mut self) {
        self.send_nonce += 2;
    }

    /// Incoming nonces must carry the remote role's parity — the opposite
    /// of ours.
    pub fn check_nonce_parity(&self, nonce: u64) -> bool {
        (nonce & 1 == 0) == self.initiator
    }

    pub fn accept_nonce(&mut self, nonce: u64) -> WindowVerdict {
        self.window.accept(nonce)
    }

    pub fn window(&self) -> &ReplayWindow {
        &self.window
    }

    /// Overrides the send counter. Test support for exercising counter
    /// exhaustion without 2^47 encrypt calls.
    #[doc(hidden)]
    pub fn preload_send_nonce(&mut self, nonce: u64) {
        self.send_nonce = nonce;
    }
}
