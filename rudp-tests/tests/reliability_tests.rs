//! Reliability accounting scenarios driven through the public API.

use rudp_protocol::{ReliabilitySystem, SeqNumber};

/// Small tick so a 40-packet exchange stays inside the one-second aging
/// window.
const DT: f64 = 0.01;

#[test]
fn dropped_packets_become_losses_after_aging() {
    let mut sender = ReliabilitySystem::new();
    let mut receiver = ReliabilitySystem::new();
    let dropped = [5u32, 7, 9];

    for i in 0..40u32 {
        let seq = sender.local_sequence();
        assert_eq!(seq.as_raw(), i);
        sender.packet_sent(256);

        if !dropped.contains(&i) {
            receiver.packet_received(seq, 256);
        }
        let (ack, ack_bits) = receiver.generate_ack_bits();
        sender.process_ack(ack, ack_bits);

        sender.update(DT);
        receiver.update(DT);
    }

    // Everything delivered is acked; the drops are still only in flight.
    assert_eq!(sender.acked_packets(), 37);
    assert_eq!(sender.lost_packets(), 0);
    assert_eq!(sender.in_flight(), 3);

    // Once they age past one second they are written off as lost.
    let mut elapsed = 0.0;
    while elapsed <= 1.1 {
        sender.update(DT);
        elapsed += DT;
    }
    assert_eq!(sender.lost_packets(), 3);
    assert_eq!(sender.acked_packets(), 37);
    assert_eq!(sender.in_flight(), 0);
}

#[test]
fn accounting_identity_holds_under_partial_delivery() {
    let mut sender = ReliabilitySystem::new();
    let mut receiver = ReliabilitySystem::new();

    for i in 0..200u32 {
        let seq = sender.local_sequence();
        sender.packet_sent(128);

        // Drop every fifth packet.
        if i % 5 != 0 {
            receiver.packet_received(seq, 128);
            let (ack, ack_bits) = receiver.generate_ack_bits();
            sender.process_ack(ack, ack_bits);
        }

        sender.update(DT);
        receiver.update(DT);

        assert_eq!(
            sender.sent_packets(),
            sender.acked_packets() + sender.lost_packets() + sender.in_flight() as u32
        );
    }
}

#[test]
fn replayed_acks_change_nothing() {
    let mut sender = ReliabilitySystem::new();
    let mut receiver = ReliabilitySystem::new();

    for _ in 0..10 {
        let seq = sender.local_sequence();
        sender.packet_sent(64);
        receiver.packet_received(seq, 64);
    }
    let (ack, ack_bits) = receiver.generate_ack_bits();
    sender.process_ack(ack, ack_bits);
    assert_eq!(sender.acked_packets(), 10);

    for _ in 0..5 {
        sender.process_ack(ack, ack_bits);
    }
    assert_eq!(sender.acked_packets(), 10);
    assert_eq!(sender.lost_packets(), 0);
}

#[test]
fn late_ack_cannot_resurrect_a_loss() {
    let mut sender = ReliabilitySystem::new();
    let seq = sender.local_sequence();
    sender.packet_sent(64);

    let mut elapsed = 0.0;
    while elapsed <= 1.1 {
        sender.update(DT);
        elapsed += DT;
    }
    assert_eq!(sender.lost_packets(), 1);

    sender.process_ack(seq, 0);
    assert_eq!(sender.lost_packets(), 1);
    assert_eq!(sender.acked_packets(), 0);
}

#[test]
fn nothing_outlives_the_aging_window() {
    let mut sys = ReliabilitySystem::new();
    for _ in 0..20 {
        sys.packet_sent(256);
    }
    sys.packet_received(SeqNumber::new(3), 256);

    let mut elapsed = 0.0;
    while elapsed <= 1.1 {
        sys.update(DT);
        elapsed += DT;
    }

    assert_eq!(sys.in_flight(), 0);
    assert_eq!(sys.sent_bandwidth(), 0.0);
    assert_eq!(sys.acked_bandwidth(), 0.0);
    // The aged-out receive no longer feeds ack bits.
    let (_, ack_bits) = sys.generate_ack_bits();
    assert_eq!(ack_bits, 0);
}

#[test]
fn reordered_delivery_still_acks_everything() {
    let mut sender = ReliabilitySystem::new();
    let mut receiver = ReliabilitySystem::new();

    let mut seqs = Vec::new();
    for _ in 0..8 {
        seqs.push(sender.local_sequence());
        sender.packet_sent(64);
    }

    // Deliver in a scrambled order.
    for &i in &[3usize, 0, 7, 1, 5, 2, 6, 4] {
        receiver.packet_received(seqs[i], 64);
    }
    let (ack, ack_bits) = receiver.generate_ack_bits();
    assert_eq!(ack.as_raw(), 7);
    sender.process_ack(ack, ack_bits);

    assert_eq!(sender.acked_packets(), 8);
    assert_eq!(sender.in_flight(), 0);
}
