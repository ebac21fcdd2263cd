//! Events the tunnel surfaces to the handshake subsystem.

use crate::peer::PeerId;

/// Lifecycle notifications, drained via [`crate::Tunnel::poll_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The peer's first session carried traffic in at least one direction.
    Established(PeerId),
    /// The current session wants a refresh; the handshake subsystem
    /// should start a new exchange.
    RefreshWanted(PeerId),
    /// A caller-driven session rotation completed.
    SessionInstalled(PeerId),
}
