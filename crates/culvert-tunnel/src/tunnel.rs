//! The tunnel context — peer table, packet pipeline glue, and lifecycle
//! events.
//!
//! One context serves one virtual interface. It is single-threaded by
//! design: the embedding event loop multiplexes the UDP socket, the
//! TUN/TAP device, and timers, and calls in here between poll iterations.
//! Nothing blocks, nothing reads a clock — `now_tick` supplies time.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use culvert_core::common::Timestamp;
use culvert_core::{Buffer, Decrypted, Method, PacketError, Session, SessionParams};

use crate::config::TunnelConfig;
use crate::event::Event;
use crate::peer::{Peer, PeerId, PeerStats};

/// A decrypted inbound packet, ready for the Ethernet/IP demultiplexer.
#[derive(Debug)]
pub struct Inbound {
    pub buffer: Buffer,
    /// The packet arrived out of order. Upstream decoders (ARP caches and
    /// the like) may prefer to ignore reordered payloads.
    pub reordered: bool,
}

/// Everything the packet pipeline owns: configuration, the configured
/// method, the peer table, the event queue, and the context random seed.
pub struct Tunnel {
    config: TunnelConfig,
    method: Method,
    now: Timestamp,
    rng: StdRng,
    peers: HashMap<PeerId, Peer>,
    events: VecDeque<Event>,
}

impl Tunnel {
    pub fn new(config: TunnelConfig, method: Method) -> Tunnel {
        Tunnel::build(config, method, StdRng::from_entropy())
    }

    /// Deterministic context for tests and reproducible benchmarks.
    pub fn with_seed(config: TunnelConfig, method: Method, seed: u64) -> Tunnel {
        Tunnel::build(config, method, StdRng::seed_from_u64(seed))
    }

    fn build(config: TunnelConfig, method: Method, rng: StdRng) -> Tunnel {
        Tunnel {
            config,
            method,
            now: Timestamp::ZERO,
            rng,
            peers: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn has_peer(&self, peer_id: PeerId) -> bool {
        self.peers.contains_key(&peer_id)
    }

    pub fn peer_stats(&self, peer_id: PeerId) -> Option<PeerStats> {
        self.peers.get(&peer_id).map(Peer::stats)
    }

    /// Largest wire datagram this tunnel will produce; sizes socket
    /// receive buffers.
    pub fn max_packet_size(&self) -> usize {
        self.method.max_packet_size(self.config.max_payload_size())
    }

    /// Empty buffer sized for a read from the virtual interface, with the
    /// head and tail space `encrypt` will consume.
    pub fn alloc_egress_buffer(&self) -> Buffer {
        Buffer::alloc(
            self.config.max_payload_size(),
            self.method.encrypt_headroom(),
            self.method.tailroom(),
        )
    }

    /// Copy a received datagram into a buffer carrying the head and tail
    /// space `decrypt` will consume.
    pub fn alloc_ingress_buffer(&self, datagram: &[u8]) -> Buffer {
        Buffer::from_slice(datagram, self.method.decrypt_headroom(), self.method.tailroom())
    }

    /// Refresh the context clock. Reaps lingering superseded sessions and
    /// surfaces refresh requests whose deadline has passed.
    pub fn now_tick(&mut self, now: Timestamp) {
        self.now = now;
        for (id, peer) in self.peers.iter_mut() {
            if peer.reap_previous(now) {
                trace!(peer = %id, "previous session expired after linger");
            }
            if !peer.refresh_signalled && peer.current.want_refresh(now) {
                peer.refresh_signalled = true;
                self.events.push_back(Event::RefreshWanted(*id));
            }
        }
    }

    /// Build session state from handshake key material, applying the
    /// configured lifetime and a jittered refresh deadline.
    ///
    /// Panics if `secret` is not exactly `method().key_length()` bytes.
    pub fn create_session(&mut self, secret: &[u8], initiator: bool) -> Session {
        let session = &self.config.session;
        let jitter_ms = if session.refresh_jitter_secs == 0 {
            0
        } else {
            self.rng.gen_range(0..session.refresh_jitter_secs * 1000)
        };
        let params = SessionParams {
            valid_for: session.valid_secs * 1000,
            refresh_after: session.refresh_secs * 1000 + jitter_ms,
            refresh_after_packets: session.refresh_after_packets,
        };
        self.method.session_init(secret, initiator, &params, self.now)
    }

    /// Install a session for a peer, creating the peer record on first
    /// install. An existing current session is rotated into the previous
    /// slot, where it lingers until `session.linger_secs` pass or one
    /// more outbound packet is sent, whichever comes first.
    pub fn install_session(&mut self, peer_id: PeerId, session: Session) {
        let expires = self.now.add_secs(self.config.session.linger_secs);
        match self.peers.entry(peer_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().rotate(session, expires);
                debug!(peer = %peer_id, "session rotated");
            }
            Entry::Vacant(entry) => {
                entry.insert(Peer::new(session));
                debug!(peer = %peer_id, "first session installed");
            }
        }
        self.events.push_back(Event::SessionInstalled(peer_id));
    }

    /// Remove a peer and both of its sessions.
    pub fn drop_peer(&mut self, peer_id: PeerId) -> bool {
        let removed = self.peers.remove(&peer_id).is_some();
        if removed {
            debug!(peer = %peer_id, "peer dropped");
        }
        removed
    }

    /// Ingress: decrypt a datagram with the peer's current session,
    /// falling back to the previous session once. Failures are local —
    /// they are counted, logged, and never propagate.
    pub fn handle_datagram(&mut self, peer_id: PeerId, datagram: Buffer) -> Option<Inbound> {
        let now = self.now;
        let Some(peer) = self.peers.get_mut(&peer_id) else {
            trace!(peer = %peer_id, "datagram for unknown peer");
            return None;
        };

        let failure = match peer.current.decrypt(now, datagram) {
            Ok(outcome) => return finish_inbound(peer, &mut self.events, peer_id, outcome),
            Err(failure) => failure,
        };

        // In-flight packets from before the last rekey still decrypt
        // under the previous session.
        if let Some(previous) = peer.previous.as_mut() {
            match previous.decrypt(now, failure.input) {
                Ok(outcome) => return finish_inbound(peer, &mut self.events, peer_id, outcome),
                Err(second) => {
                    peer.stats.drops += 1;
                    debug!(peer = %peer_id, error = %second.error, "dropping undecryptable datagram");
                    return None;
                }
            }
        }

        peer.stats.drops += 1;
        debug!(peer = %peer_id, error = %failure.error, "dropping undecryptable datagram");
        None
    }

    /// Egress: frame and encrypt one packet from the virtual interface
    /// with the peer's current session. Returns the wire datagram to
    /// submit to the socket.
    pub fn send_frame(&mut self, peer_id: PeerId, frame: &[u8]) -> Option<Buffer> {
        let now = self.now;
        let head = self.method.encrypt_headroom();
        let tail = self.method.tailroom();
        let Some(peer) = self.peers.get_mut(&peer_id) else {
            trace!(peer = %peer_id, "frame for unknown peer");
            return None;
        };

        if !peer.current.is_valid(now) {
            debug!(peer = %peer_id, "egress dropped: current session is not valid");
            if !peer.refresh_signalled && peer.current.want_refresh(now) {
                peer.refresh_signalled = true;
                self.events.push_back(Event::RefreshWanted(peer_id));
            }
            return None;
        }

        let input = Buffer::from_slice(frame, head, tail);
        match peer.current.encrypt(input) {
            Ok(datagram) => {
                peer.stats.packets_out += 1;
                // One outbound packet on the new session releases the old
                // one, even before its linger deadline.
                if peer.previous.take().is_some() {
                    trace!(peer = %peer_id, "previous session released after outbound packet");
                }
                if !peer.established && peer.current.is_initiator() {
                    peer.established = true;
                    self.events.push_back(Event::Established(peer_id));
                }
                if !peer.refresh_signalled && peer.current.want_refresh(now) {
                    peer.refresh_signalled = true;
                    self.events.push_back(Event::RefreshWanted(peer_id));
                }
                Some(datagram)
            }
            Err(error) => {
                warn!(peer = %peer_id, %error, "encrypt failed");
                if error == PacketError::NonceExhausted && !peer.refresh_signalled {
                    peer.refresh_signalled = true;
                    self.events.push_back(Event::RefreshWanted(peer_id));
                }
                None
            }
        }
    }

    /// Drain one queued lifecycle event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Uniform random value from the context seed. The handshake
    /// subsystem draws retry and announcement jitter from here so a
    /// seeded context replays deterministically.
    pub fn rand_range(&mut self, range: std::ops::Range<u64>) -> u64 {
        self.rng.gen_range(range)
    }
}

fn finish_inbound(
    peer: &mut Peer,
    events: &mut VecDeque<Event>,
    peer_id: PeerId,
    outcome: Decrypted,
) -> Option<Inbound> {
    match outcome {
        Decrypted::Accepted { buffer, reordered } => {
            peer.stats.packets_in += 1;
            if !peer.established {
                peer.established = true;
                events.push_back(Event::Established(peer_id));
            }
            Some(Inbound { buffer, reordered })
        }
        Decrypted::Stale => {
            trace!(peer = %peer_id, "authentic duplicate discarded");
            None
        }
    }
}
