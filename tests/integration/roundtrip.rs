use crate::*;

/// One packet, production-shaped suite, bit-exact wire expectations:
/// 8-byte header + 4-byte ciphertext + 16-byte tag, nonce 1, flags 0.
#[test]
fn one_packet_round_trip() {
    let (method, mut initiator, mut responder) = session_pair(AEAD_SPLIT);

    let wire = initiator
        .encrypt(plaintext_buffer(&method, &[0x01, 0x02, 0x03, 0x04]))
        .unwrap();
    assert_eq!(wire.len(), 28);
    assert_eq!(&wire.data()[..6], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
    assert_eq!(wire.data()[6], 0, "flags must be zero");
    assert_eq!(wire.data()[7], 0, "reserved must be zero");

    let (plaintext, reordered) = expect_plaintext(
        responder
            .decrypt(Timestamp::ZERO, wire_buffer(&method, wire.data()))
            .unwrap(),
    );
    assert_eq!(plaintext, [0x01, 0x02, 0x03, 0x04]);
    assert!(!reordered);
}

/// Every registered suite round-trips in both directions.
#[test]
fn all_suites_round_trip_both_directions() {
    for name in [AEAD_SPLIT, AEAD_SINGLE, CIPHER_TEST_NULL, CIPHER_TEST_SALSA] {
        let (method, mut initiator, mut responder) = session_pair(name);

        let wire = initiator
            .encrypt(plaintext_buffer(&method, b"initiator to responder"))
            .unwrap();
        let (plaintext, _) = expect_plaintext(
            responder
                .decrypt(Timestamp::ZERO, wire_buffer(&method, wire.data()))
                .unwrap(),
        );
        assert_eq!(plaintext, b"initiator to responder", "suite {name}");

        let wire = responder
            .encrypt(plaintext_buffer(&method, b"responder to initiator"))
            .unwrap();
        let (plaintext, _) = expect_plaintext(
            initiator
                .decrypt(Timestamp::ZERO, wire_buffer(&method, wire.data()))
                .unwrap(),
        );
        assert_eq!(plaintext, b"responder to initiator", "suite {name}");
    }
}

/// Cipher-test with the null permutation reproduces the payload exactly.
#[test]
fn cipher_test_null_is_deterministic() {
    let (method, mut initiator, mut responder) = session_pair(CIPHER_TEST_NULL);
    let payload = [0xAAu8; 32];

    let wire = initiator.encrypt(plaintext_buffer(&method, &payload)).unwrap();
    assert_eq!(wire.len(), 40);
    assert_eq!(&wire.data()[8..], &payload[..]);

    let (plaintext, _) = expect_plaintext(
        responder
            .decrypt(Timestamp::ZERO, wire_buffer(&method, wire.data()))
            .unwrap(),
    );
    assert_eq!(plaintext, payload);
}

/// Initiator nonces are odd, responder nonces are even, and both sides
/// advance strictly by two.
#[test]
fn nonce_parity_and_stride() {
    let (method, mut initiator, mut responder) = session_pair(AEAD_SINGLE);

    let mut last_odd = None;
    let mut last_even = None;
    for _ in 0..5 {
        let wire = initiator.encrypt(plaintext_buffer(&method, b"i")).unwrap();
        let nonce = nonce_of(wire.data());
        assert_eq!(nonce & 1, 1);
        if let Some(previous) = last_odd {
            assert_eq!(nonce, previous + 2);
        }
        last_odd = Some(nonce);

        let wire = responder.encrypt(plaintext_buffer(&method, b"r")).unwrap();
        let nonce = nonce_of(wire.data());
        assert_eq!(nonce & 1, 0);
        if let Some(previous) = last_even {
            assert_eq!(nonce, previous + 2);
        }
        last_even = Some(nonce);
    }
}

/// Payload sizes from empty through several blocks all survive.
#[test]
fn assorted_payload_sizes() {
    let (method, mut initiator, mut responder) = session_pair(AEAD_SINGLE);
    for size in [0usize, 1, 15, 16, 17, 63, 64, 65, 1500] {
        let payload = vec![0x5Au8; size];
        let wire = initiator.encrypt(plaintext_buffer(&method, &payload)).unwrap();
        assert_eq!(wire.len(), size + method.overhead());
        let (plaintext, _) = expect_plaintext(
            responder
                .decrypt(Timestamp::ZERO, wire_buffer(&method, wire.data()))
                .unwrap(),
        );
        assert_eq!(plaintext, payload, "payload size {size}");
    }
}

fn nonce_of(datagram: &[u8]) -> u64 {
    let mut wide = [0u8; 8];
    wide[2..].copy_from_slice(&datagram[..6]);
    u64::from_be_bytes(wide)
}
