//! rudp Receiver
//!
//! Listens for a sender, accumulates the transferred file, verifies the
//! CRC32 trailer against its own checksum of the received bytes, and
//! writes the file out. Returns to listening when the sender goes away.

use anyhow::Context;
use clap::Parser;
use rudp_cli::transfer::{self, Frame};
use rudp_cli::{
    format_bytes, reliability_summary, TransferConfig, PROTOCOL_ID, TICK_RATE_HZ,
};
use rudp_io::{SendPacer, Ticker};
use rudp_protocol::{FlowControl, ReliableConnection};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "rudp-receiver")]
#[command(about = "Receive files over a reliable UDP connection", long_about = None)]
struct Args {
    /// Directory to write received files into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

/// State of the transfer currently in progress.
#[derive(Default)]
struct IncomingTransfer {
    name: Option<String>,
    announced_packets: u64,
    data: Vec<u8>,
    ack_pending: bool,
}

impl IncomingTransfer {
    fn reset(&mut self) {
        *self = IncomingTransfer::default();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let mut config = match &args.config {
        Some(path) => TransferConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TransferConfig::default(),
    };
    if let Some(port) = args.port {
        config.server_port = port;
    }
    config.validate()?;

    let mut connection = ReliableConnection::new(PROTOCOL_ID, config.timeout_secs);
    connection.start(config.server_port)?;
    connection.listen();
    tracing::info!(port = config.server_port, "listening");

    let mut flow = FlowControl::new();
    let mut ticker = Ticker::from_hz(TICK_RATE_HZ);
    let mut pacer = SendPacer::new();

    let mut transfer_state = IncomingTransfer::default();
    let mut was_connected = false;
    let mut stats_accumulator = 0.0;
    let mut recv_buf = vec![0u8; config.packet_size + 64];

    loop {
        let dt = ticker.wait();
        connection.update(dt);

        if was_connected && !connection.is_connected() {
            tracing::info!("sender went away; listening again");
            flow.reset();
            transfer_state.reset();
            was_connected = false;
        }
        if connection.is_connected() {
            if !was_connected {
                tracing::info!(remote = %connection.remote_addr().map(|a| a.to_string()).unwrap_or_default(), "sender connected");
                was_connected = true;
            }
            flow.update(dt, connection.reliability().rtt() * 1000.0);
        }

        // Drain inbound packets.
        loop {
            let n = connection.receive_packet(&mut recv_buf);
            if n == 0 {
                break;
            }
            match Frame::parse(&recv_buf[..n]) {
                Frame::Metadata {
                    total_packets,
                    name,
                } => {
                    tracing::info!(file = %name, packets = total_packets, "incoming transfer");
                    transfer_state.reset();
                    transfer_state.name = Some(name);
                    transfer_state.announced_packets = total_packets;
                    transfer_state.ack_pending = true;
                }
                Frame::Checksum(sender_crc) => {
                    finish_transfer(&mut transfer_state, sender_crc, &args.output);
                }
                Frame::MetadataAck => {}
                Frame::Data(bytes) => {
                    transfer_state.data.extend_from_slice(bytes);
                }
            }
        }

        // Keepalives carry our acks back at the governed rate.
        if connection.is_connected() {
            pacer.advance(dt);
            while pacer.try_consume(flow.send_rate()) {
                let payload = if transfer_state.ack_pending {
                    transfer_state.ack_pending = false;
                    transfer::encode_metadata_ack()
                } else {
                    Vec::new()
                };
                connection.send_packet(&payload);
            }
        } else {
            pacer.clear();
        }

        stats_accumulator += dt;
        while stats_accumulator >= config.stats_interval_secs {
            if connection.is_connected() {
                tracing::info!("{}", reliability_summary(connection.reliability()));
            }
            stats_accumulator -= config.stats_interval_secs;
        }
    }
}

/// Verify the sender's CRC against the accumulated bytes and write the
/// file out on a match.
fn finish_transfer(state: &mut IncomingTransfer, sender_crc: u32, output_dir: &Path) {
    let local_crc = transfer::crc32(&state.data);
    let name = state.name.clone().unwrap_or_else(|| "received.bin".to_string());

    if local_crc == sender_crc {
        tracing::info!(
            file = %name,
            size = %format_bytes(state.data.len() as u64),
            crc = %format_args!("{:08X}", local_crc),
            "transfer verified; CRC32 matched"
        );

        // Only the base name, so metadata cannot steer the write path.
        let safe_name = Path::new(&name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "received.bin".into());
        let dest = output_dir.join(safe_name);
        match std::fs::write(&dest, &state.data) {
            Ok(()) => tracing::info!(path = %dest.display(), "file written"),
            Err(e) => tracing::error!(path = %dest.display(), error = %e, "failed to write file"),
        }
    } else {
        tracing::error!(
            file = %name,
            announced_packets = state.announced_packets,
            received = %format_bytes(state.data.len() as u64),
            ours = %format_args!("{:08X}", local_crc),
            theirs = %format_args!("{:08X}", sender_crc),
            "transfer failed; CRC32 mismatch"
        );
    }

    state.reset();
}
