//! Reliability System
//!
//! Per-connection sequencing and acknowledgement bookkeeping: stamps
//! outgoing packets with `(seq, ack, ack_bits)`, matches inbound ack
//! fields against in-flight packets to measure RTT, declares packets lost
//! when they age out unacknowledged, and keeps rolling bandwidth figures
//! over a one-second window.
//!
//! Nothing here touches a socket; [`crate::reliable::ReliableConnection`]
//! feeds this system from the wire.

use crate::sequence::SeqNumber;
use std::collections::VecDeque;

/// Queue entries older than this (seconds) are aged out.
const MAX_PACKET_AGE: f64 = 1.0;

/// Slack added to the age limit so float accumulation cannot age an entry
/// one tick early.
const AGE_EPSILON: f64 = 0.001;

/// Weight of each new RTT sample in the smoothed estimate.
const RTT_SMOOTHING: f64 = 0.1;

/// Bookkeeping for one tracked packet.
#[derive(Debug, Clone, Copy)]
pub struct PacketInfo {
    /// Sequence number assigned to the packet.
    pub sequence: SeqNumber,
    /// Seconds since the packet was sent (or received).
    pub time_since_sent: f64,
    /// Payload bytes charged to bandwidth accounting.
    pub size: usize,
}

/// Sequencing, acknowledgement, and loss accounting for one connection.
///
/// Four queues track packet lifecycles: everything sent (`sent_queue`),
/// packets awaiting acknowledgement (`pending_ack_queue`), everything
/// observed from the peer (`received_queue`, source of outbound ack
/// bitfields), and packets confirmed delivered (`acked_queue`). Entries
/// age out of all four after one second; a pending packet that ages out
/// is counted lost and never resurrected.
pub struct ReliabilitySystem {
    local_sequence: SeqNumber,
    remote_sequence: SeqNumber,

    sent_packets: u32,
    received_packets: u32,
    lost_packets: u32,
    acked_packets: u32,

    sent_bandwidth: f64,
    acked_bandwidth: f64,
    rtt: f64,

    sent_queue: VecDeque<PacketInfo>,
    pending_ack_queue: VecDeque<PacketInfo>,
    received_queue: VecDeque<PacketInfo>,
    acked_queue: VecDeque<PacketInfo>,

    /// Sequences newly acknowledged during the current update cycle.
    acks: Vec<SeqNumber>,
}

impl ReliabilitySystem {
    pub fn new() -> Self {
        ReliabilitySystem {
            local_sequence: SeqNumber::new(0),
            remote_sequence: SeqNumber::new(0),
            sent_packets: 0,
            received_packets: 0,
            lost_packets: 0,
            acked_packets: 0,
            sent_bandwidth: 0.0,
            acked_bandwidth: 0.0,
            rtt: 0.0,
            sent_queue: VecDeque::new(),
            pending_ack_queue: VecDeque::new(),
            received_queue: VecDeque::new(),
            acked_queue: VecDeque::new(),
            acks: Vec::new(),
        }
    }

    /// Forget all state; used when a connection drops.
    pub fn reset(&mut self) {
        *self = ReliabilitySystem::new();
    }

    /// Record a packet handed to the socket.
    ///
    /// Assigns the current local sequence and advances it (wrapping).
    /// `size` is the payload byte count charged to bandwidth accounting.
    pub fn packet_sent(&mut self, size: usize) {
        let info = PacketInfo {
            sequence: self.local_sequence,
            time_since_sent: 0.0,
            size,
        };
        self.sent_queue.push_back(info);
        self.pending_ack_queue.push_back(info);
        self.sent_packets += 1;
        self.local_sequence.increment();
    }

    /// Record a verified inbound packet.
    ///
    /// Duplicates still count toward `received_packets` but the queue
    /// keeps only the first arrival. `remote_sequence` advances when the
    /// new sequence is more recent.
    pub fn packet_received(&mut self, sequence: SeqNumber, size: usize) {
        self.received_packets += 1;

        if !self.received_queue.iter().any(|p| p.sequence == sequence) {
            insert_by_sequence(
                &mut self.received_queue,
                PacketInfo {
                    sequence,
                    time_since_sent: 0.0,
                    size,
                },
            );
        }

        if sequence.newer_than(self.remote_sequence) {
            self.remote_sequence = sequence;
        }
    }

    /// Build the `(ack, ack_bits)` pair for the next outbound header.
    ///
    /// `ack` is the most recent sequence observed from the peer; bit `i`
    /// of the field means `ack - 1 - i` has also been observed. Sequences
    /// more than 32 behind contribute nothing.
    pub fn generate_ack_bits(&self) -> (SeqNumber, u32) {
        let ack = self.remote_sequence;
        let mut ack_bits = 0u32;

        for info in &self.received_queue {
            if info.sequence == ack {
                continue;
            }
            let behind = info.sequence.distance_to(ack);
            if (1..=32).contains(&behind) {
                ack_bits |= 1 << (behind - 1);
            }
        }

        (ack, ack_bits)
    }

    /// Match an inbound `(ack, ack_bits)` pair against in-flight packets.
    ///
    /// Each newly matched packet yields an RTT sample, moves from the
    /// pending queue to the acked queue, and lands in [`Self::acks`].
    /// Sequences already acked or already aged out (lost) are ignored, so
    /// replaying an ack is harmless.
    pub fn process_ack(&mut self, ack: SeqNumber, ack_bits: u32) {
        let mut i = 0;
        while i < self.pending_ack_queue.len() {
            let sequence = self.pending_ack_queue[i].sequence;
            if !acked_by(sequence, ack, ack_bits) {
                i += 1;
                continue;
            }

            if let Some(info) = self.pending_ack_queue.remove(i) {
                self.rtt += (info.time_since_sent - self.rtt) * RTT_SMOOTHING;
                insert_by_sequence(&mut self.acked_queue, info);
                self.acks.push(sequence);
                self.acked_packets += 1;
            }
        }
    }

    /// Advance all timers by `dt` seconds, age out stale entries, and
    /// recompute the rolling bandwidth figures.
    ///
    /// A pending entry removed here (rather than by an ack) is declared
    /// lost. The acks-this-tick list resets at the start of each update.
    pub fn update(&mut self, dt: f64) {
        self.acks.clear();
        self.advance_queue_time(dt);
        self.update_queues();
        self.update_stats();
    }

    fn advance_queue_time(&mut self, dt: f64) {
        for queue in [
            &mut self.sent_queue,
            &mut self.pending_ack_queue,
            &mut self.received_queue,
            &mut self.acked_queue,
        ] {
            for info in queue.iter_mut() {
                info.time_since_sent += dt;
            }
        }
    }

    fn update_queues(&mut self) {
        let limit = MAX_PACKET_AGE + AGE_EPSILON;

        // sent_queue and pending_ack_queue are FIFO by send time.
        while self
            .sent_queue
            .front()
            .is_some_and(|p| p.time_since_sent > limit)
        {
            self.sent_queue.pop_front();
        }

        while self
            .pending_ack_queue
            .front()
            .is_some_and(|p| p.time_since_sent > limit)
        {
            let info = self.pending_ack_queue.pop_front();
            self.lost_packets += 1;
            if let Some(info) = info {
                tracing::trace!(sequence = info.sequence.as_raw(), "packet lost");
            }
        }

        self.received_queue.retain(|p| p.time_since_sent <= limit);
        self.acked_queue.retain(|p| p.time_since_sent <= limit);
    }

    fn update_stats(&mut self) {
        let sent_bytes: usize = self.sent_queue.iter().map(|p| p.size).sum();
        let acked_bytes: usize = self.acked_queue.iter().map(|p| p.size).sum();
        self.sent_bandwidth = sent_bytes as f64 * 8.0 / MAX_PACKET_AGE;
        self.acked_bandwidth = acked_bytes as f64 * 8.0 / MAX_PACKET_AGE;
    }

    /// Sequence the next outbound packet will carry.
    pub fn local_sequence(&self) -> SeqNumber {
        self.local_sequence
    }

    /// Most recent sequence observed from the peer.
    pub fn remote_sequence(&self) -> SeqNumber {
        self.remote_sequence
    }

    /// Smoothed round-trip time in seconds.
    pub fn rtt(&self) -> f64 {
        self.rtt
    }

    pub fn sent_packets(&self) -> u32 {
        self.sent_packets
    }

    pub fn received_packets(&self) -> u32 {
        self.received_packets
    }

    pub fn lost_packets(&self) -> u32 {
        self.lost_packets
    }

    pub fn acked_packets(&self) -> u32 {
        self.acked_packets
    }

    /// Bits per second handed to the socket over the trailing second.
    pub fn sent_bandwidth(&self) -> f64 {
        self.sent_bandwidth
    }

    /// Bits per second confirmed delivered over the trailing second.
    pub fn acked_bandwidth(&self) -> f64 {
        self.acked_bandwidth
    }

    /// Packets sent but neither acked nor yet declared lost.
    pub fn in_flight(&self) -> usize {
        self.pending_ack_queue.len()
    }

    /// Sequences acknowledged since the last [`Self::update`].
    pub fn acks(&self) -> &[SeqNumber] {
        &self.acks
    }
}

impl Default for ReliabilitySystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `sequence` is covered by an `(ack, ack_bits)` pair.
fn acked_by(sequence: SeqNumber, ack: SeqNumber, ack_bits: u32) -> bool {
    if sequence == ack {
        return true;
    }
    let behind = sequence.distance_to(ack);
    (1..=32).contains(&behind) && (ack_bits >> (behind - 1)) & 1 == 1
}

/// Insert keeping the queue ordered by sequence, oldest first.
fn insert_by_sequence(queue: &mut VecDeque<PacketInfo>, info: PacketInfo) {
    let mut idx = queue.len();
    while idx > 0 && queue[idx - 1].sequence.newer_than(info.sequence) {
        idx -= 1;
    }
    queue.insert(idx, info);
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 30.0;

    /// Deliver every currently in-flight packet from `sender` to
    /// `receiver` and route the resulting ack pair back.
    fn deliver_and_ack(sender: &mut ReliabilitySystem, receiver: &mut ReliabilitySystem) {
        let pending: Vec<_> = sender.pending_ack_queue.iter().map(|p| (p.sequence, p.size)).collect();
        for (seq, size) in pending {
            receiver.packet_received(seq, size);
        }
        let (ack, ack_bits) = receiver.generate_ack_bits();
        sender.process_ack(ack, ack_bits);
    }

    #[test]
    fn test_sequences_assigned_in_order() {
        let mut sys = ReliabilitySystem::new();
        for _ in 0..5 {
            sys.packet_sent(256);
        }
        let seqs: Vec<u32> = sys.sent_queue.iter().map(|p| p.sequence.as_raw()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert_eq!(sys.local_sequence().as_raw(), 5);
        assert_eq!(sys.sent_packets(), 5);
        assert_eq!(sys.in_flight(), 5);
    }

    #[test]
    fn test_sequence_wraparound_on_send() {
        let mut sys = ReliabilitySystem::new();
        sys.local_sequence = SeqNumber::new(u32::MAX - 1);

        for _ in 0..5 {
            sys.packet_sent(256);
        }

        let seqs: Vec<u32> = sys.sent_queue.iter().map(|p| p.sequence.as_raw()).collect();
        assert_eq!(seqs, vec![u32::MAX - 1, u32::MAX, 0, 1, 2]);
        assert!(SeqNumber::new(1).newer_than(SeqNumber::new(u32::MAX)));
    }

    #[test]
    fn test_remote_sequence_tracks_most_recent() {
        let mut sys = ReliabilitySystem::new();
        sys.packet_received(SeqNumber::new(5), 256);
        sys.packet_received(SeqNumber::new(3), 256); // reordered arrival
        assert_eq!(sys.remote_sequence().as_raw(), 5);
    }

    #[test]
    fn test_duplicates_counted_but_not_queued() {
        let mut sys = ReliabilitySystem::new();
        sys.packet_received(SeqNumber::new(7), 256);
        sys.packet_received(SeqNumber::new(7), 256);
        assert_eq!(sys.received_packets(), 2);
        assert_eq!(sys.received_queue.len(), 1);
    }

    #[test]
    fn test_ack_bits_cover_preceding_window() {
        let mut sys = ReliabilitySystem::new();
        for seq in [0u32, 1, 2, 4, 5] {
            sys.packet_received(SeqNumber::new(seq), 256);
        }

        let (ack, ack_bits) = sys.generate_ack_bits();
        assert_eq!(ack.as_raw(), 5);
        // ack-1=4 -> bit 0, ack-2=3 missing, ack-3=2 -> bit 2, ...
        assert_eq!(ack_bits, 0b11101);
    }

    #[test]
    fn test_ack_bits_ignore_far_behind() {
        let mut sys = ReliabilitySystem::new();
        sys.packet_received(SeqNumber::new(100), 256);
        sys.packet_received(SeqNumber::new(60), 256); // 40 behind, out of window
        let (ack, ack_bits) = sys.generate_ack_bits();
        assert_eq!(ack.as_raw(), 100);
        assert_eq!(ack_bits, 0);
        assert_eq!(sys.received_queue.len(), 2);
    }

    #[test]
    fn test_ack_moves_pending_to_acked() {
        let mut sender = ReliabilitySystem::new();
        let mut receiver = ReliabilitySystem::new();

        for _ in 0..3 {
            sender.packet_sent(256);
        }
        deliver_and_ack(&mut sender, &mut receiver);

        assert_eq!(sender.acked_packets(), 3);
        assert_eq!(sender.in_flight(), 0);
        assert_eq!(sender.acks().len(), 3);
        assert_eq!(sender.lost_packets(), 0);
    }

    #[test]
    fn test_ack_replay_is_idempotent() {
        let mut sender = ReliabilitySystem::new();
        let mut receiver = ReliabilitySystem::new();

        sender.packet_sent(256);
        deliver_and_ack(&mut sender, &mut receiver);
        assert_eq!(sender.acked_packets(), 1);

        let (ack, ack_bits) = receiver.generate_ack_bits();
        sender.process_ack(ack, ack_bits);
        sender.process_ack(ack, ack_bits);

        assert_eq!(sender.acked_packets(), 1);
        assert_eq!(sender.lost_packets(), 0);
        assert_eq!(sender.acked_queue.len(), 1);
    }

    #[test]
    fn test_unacked_packets_age_to_lost() {
        let mut sys = ReliabilitySystem::new();
        for _ in 0..4 {
            sys.packet_sent(256);
        }

        let mut elapsed = 0.0;
        while elapsed <= 1.1 {
            sys.update(DT);
            elapsed += DT;
        }

        assert_eq!(sys.lost_packets(), 4);
        assert_eq!(sys.in_flight(), 0);
        assert!(sys.sent_queue.is_empty());
    }

    #[test]
    fn test_lost_packet_not_resurrected_by_late_ack() {
        let mut sys = ReliabilitySystem::new();
        sys.packet_sent(256);

        let mut elapsed = 0.0;
        while elapsed <= 1.1 {
            sys.update(DT);
            elapsed += DT;
        }
        assert_eq!(sys.lost_packets(), 1);

        // The ack arrives after the packet was written off.
        sys.process_ack(SeqNumber::new(0), 0);
        assert_eq!(sys.lost_packets(), 1);
        assert_eq!(sys.acked_packets(), 0);
    }

    #[test]
    fn test_sent_equals_acked_plus_lost_plus_pending() {
        let mut sender = ReliabilitySystem::new();
        let mut receiver = ReliabilitySystem::new();

        for round in 0..40 {
            sender.packet_sent(256);
            // Deliver two of every three rounds; the rest age to lost.
            if round % 3 != 0 {
                deliver_and_ack(&mut sender, &mut receiver);
            }
            sender.update(DT);
            receiver.update(DT);

            let accounted =
                sender.acked_packets() + sender.lost_packets() + sender.in_flight() as u32;
            assert_eq!(sender.sent_packets(), accounted);
        }
    }

    #[test]
    fn test_rtt_converges_on_constant_delay() {
        let mut sender = ReliabilitySystem::new();
        let mut receiver = ReliabilitySystem::new();
        let true_rtt = 4.0 * DT;

        for _ in 0..50 {
            sender.packet_sent(256);
            // Age the in-flight packet by the true RTT before its ack.
            for _ in 0..4 {
                sender.update(DT);
                receiver.update(DT);
            }
            deliver_and_ack(&mut sender, &mut receiver);
        }

        assert!(sender.lost_packets() == 0);
        assert!((sender.rtt() - true_rtt).abs() < true_rtt * 0.1);
    }

    #[test]
    fn test_bandwidth_tracks_recent_sends() {
        let mut sys = ReliabilitySystem::new();
        for _ in 0..10 {
            sys.packet_sent(125); // 1000 bits each
        }
        sys.update(DT);
        assert!((sys.sent_bandwidth() - 10_000.0).abs() < 1.0);

        // Once everything ages out the figure decays to zero.
        let mut elapsed = 0.0;
        while elapsed <= 1.1 {
            sys.update(DT);
            elapsed += DT;
        }
        assert_eq!(sys.sent_bandwidth(), 0.0);
    }

    #[test]
    fn test_acks_cleared_each_update() {
        let mut sender = ReliabilitySystem::new();
        let mut receiver = ReliabilitySystem::new();

        sender.packet_sent(256);
        deliver_and_ack(&mut sender, &mut receiver);
        assert_eq!(sender.acks(), &[SeqNumber::new(0)]);

        sender.update(DT);
        assert!(sender.acks().is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut sys = ReliabilitySystem::new();
        sys.packet_sent(256);
        sys.packet_received(SeqNumber::new(9), 256);
        sys.update(DT);

        sys.reset();
        assert_eq!(sys.sent_packets(), 0);
        assert_eq!(sys.received_packets(), 0);
        assert_eq!(sys.local_sequence().as_raw(), 0);
        assert_eq!(sys.remote_sequence().as_raw(), 0);
        assert_eq!(sys.in_flight(), 0);
    }
}
