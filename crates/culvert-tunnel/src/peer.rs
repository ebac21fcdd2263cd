//! Per-peer session slots and traffic counters.
//!
//! A peer owns at most two sessions: the current one, used for every
//! outbound packet, and the previous one, kept briefly after a rekey to
//! absorb in-flight packets. The tunnel context drives rotation and
//! reaping; peers never create themselves — the handshake subsystem
//! installs the first session.

use std::fmt;

use culvert_core::common::Timestamp;
use culvert_core::Session;

/// Opaque peer identifier, assigned by the layer that discovers peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// Traffic counters kept per peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub packets_in: u64,
    pub packets_out: u64,
    /// Inbound datagrams no session could decrypt.
    pub drops: u64,
}

/// One peer's session state, owned by the tunnel context.
#[derive(Debug)]
pub struct Peer {
    pub(crate) current: Session,
    pub(crate) previous: Option<Session>,
    pub(crate) previous_expires: Timestamp,
    pub(crate) established: bool,
    pub(crate) refresh_signalled: bool,
    pub(crate) stats: PeerStats,
}

impl Peer {
    pub(crate) fn new(session: Session) -> Peer {
        Peer {
            current: session,
            previous: None,
            previous_expires: Timestamp::ZERO,
            established: false,
            refresh_signalled: false,
            stats: PeerStats::default(),
        }
    }

    /// Rotate in a new current session. The old one is marked superseded
    /// and lingers until `expires` or the next outbound packet, whichever
    /// comes first.
    pub(crate) fn rotate(&mut self, session: Session, expires: Timestamp) {
        let mut old = std::mem::replace(&mut self.current, session);
        old.mark_superseded();
        self.previous = Some(old);
        self.previous_expires = expires;
        self.refresh_signalled = false;
    }

    /// Drop the previous session once its linger deadline passes.
    pub(crate) fn reap_previous(&mut self, now: Timestamp) -> bool {
        if self.previous.is_some() && now >= self.previous_expires {
            self.previous = None;
            return true;
        }
        false
    }

    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}
