//! Statistics display and formatting

use rudp_protocol::ReliabilitySystem;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth (bits per second) in human-readable form
pub fn format_bandwidth(bps: f64) -> String {
    const KBPS: f64 = 1000.0;
    const MBPS: f64 = KBPS * 1000.0;
    const GBPS: f64 = MBPS * 1000.0;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps / GBPS)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps / MBPS)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps / KBPS)
    } else {
        format!("{:.0} bps", bps)
    }
}

/// Format an RTT given in seconds
pub fn format_rtt(rtt_secs: f64) -> String {
    format!("{:.1}ms", rtt_secs * 1000.0)
}

/// One-line connection summary for the periodic stats log.
pub fn reliability_summary(rel: &ReliabilitySystem) -> String {
    let sent = rel.sent_packets();
    let lost = rel.lost_packets();
    let loss_pct = if sent > 0 {
        lost as f64 / sent as f64 * 100.0
    } else {
        0.0
    };

    format!(
        "rtt {} | sent {} acked {} lost {} ({:.1}%) | sent bw {} acked bw {}",
        format_rtt(rel.rtt()),
        sent,
        rel.acked_packets(),
        lost,
        loss_pct,
        format_bandwidth(rel.sent_bandwidth()),
        format_bandwidth(rel.acked_bandwidth()),
    )
}
