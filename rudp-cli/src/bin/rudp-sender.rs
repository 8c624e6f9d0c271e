//! rudp Sender
//!
//! Connects to a receiver and streams one file over the reliable
//! connection: a metadata frame, the data chunks paced by flow control,
//! and a CRC32 trailer the receiver verifies.

use anyhow::{bail, Context};
use clap::Parser;
use rudp_cli::transfer::{self, FileChunker, Frame};
use rudp_cli::{
    format_bandwidth, format_bytes, reliability_summary, TransferConfig, PROTOCOL_ID, TICK_RATE_HZ,
};
use rudp_io::{Address, SendPacer, Ticker};
use rudp_protocol::{FlowControl, ReliableConnection};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "rudp-sender")]
#[command(about = "Send a file over a reliable UDP connection", long_about = None)]
struct Args {
    /// Receiver IPv4 address (port defaults to the configured server port)
    server: String,

    /// File to send
    file: PathBuf,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the local bind port
    #[arg(long)]
    port: Option<u16>,
}

/// Where the transfer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Metadata frame not yet sent.
    Metadata,
    /// Streaming data chunks.
    Data,
    /// Everything sent; waiting for outstanding acks to drain.
    Drain,
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
        config.client_port = port;
    }
    config.validate()?;

    let server_addr: Address = if args.server.contains(':') {
        args.server
            .parse()
            .with_context(|| format!("invalid address {}", args.server))?
    } else {
        let ip: Ipv4Addr = args
            .server
            .parse()
            .with_context(|| format!("invalid IPv4 address {}", args.server))?;
        Address::from_ipv4(ip, config.server_port)
    };

    let (mut chunker, info) = FileChunker::open(&args.file, config.packet_size)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let checksum = transfer::file_crc32(&args.file)?;
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file name is not valid UTF-8")?
        .to_string();

    tracing::info!(
        file = %file_name,
        size = %format_bytes(info.file_size),
        packets = info.total_packets,
        crc = %format_args!("{:08X}", checksum),
        "sending to {}",
        server_addr
    );

    let mut connection = ReliableConnection::new(PROTOCOL_ID, config.timeout_secs);
    connection.start(config.client_port)?;
    connection.connect(server_addr);

    let mut flow = FlowControl::new();
    let mut ticker = Ticker::from_hz(TICK_RATE_HZ);
    let mut pacer = SendPacer::new();

    let mut stage = Stage::Metadata;
    let mut was_connected = false;
    let mut stats_accumulator = 0.0;
    let mut recv_buf = vec![0u8; config.packet_size + 64];
    let transfer_start = Instant::now();

    loop {
        let dt = ticker.wait();
        connection.update(dt);

        if connection.connect_failed() {
            bail!("connection to {} failed", server_addr);
        }
        if connection.is_connected() {
            if !was_connected {
                tracing::info!("connected to receiver");
                was_connected = true;
            }
            flow.update(dt, connection.reliability().rtt() * 1000.0);
        }

        // Drain inbound packets; only the metadata ack is interesting.
        loop {
            let n = connection.receive_packet(&mut recv_buf);
            if n == 0 {
                break;
            }
            if Frame::parse(&recv_buf[..n]) == Frame::MetadataAck {
                tracing::debug!("receiver acknowledged metadata");
            }
        }

        // Pace outbound packets at the governed rate. Once everything is
        // out, stop sending so the in-flight window can actually drain.
        pacer.advance(dt);
        while pacer.try_consume(flow.send_rate()) {
            let payload = if !connection.is_connected() {
                // Keepalives carry the handshake until the link is up.
                Vec::new()
            } else {
                match stage {
                    Stage::Metadata => {
                        stage = Stage::Data;
                        transfer::encode_metadata(info.total_packets, &file_name, config.packet_size)
                    }
                    Stage::Data => match chunker.next_chunk()? {
                        Some(chunk) => chunk,
                        None => {
                            stage = Stage::Drain;
                            transfer::encode_checksum(checksum)
                        }
                    },
                    Stage::Drain => break,
                }
            };
            connection.send_packet(&payload);
        }

        if stage == Stage::Drain && connection.reliability().in_flight() == 0 {
            break;
        }

        stats_accumulator += dt;
        while stats_accumulator >= config.stats_interval_secs {
            if connection.is_connected() {
                tracing::info!("{}", reliability_summary(connection.reliability()));
            }
            stats_accumulator -= config.stats_interval_secs;
        }
    }

    let elapsed = transfer_start.elapsed();
    let rel = connection.reliability();
    let throughput = info.file_size as f64 * 8.0 / elapsed.as_secs_f64().max(1e-9);
    tracing::info!(
        elapsed = %format_args!("{:.1}s", elapsed.as_secs_f64()),
        throughput = %format_bandwidth(throughput),
        lost = rel.lost_packets(),
        "transfer complete; CRC32 {:08X} sent",
        checksum
    );

    connection.stop();
    Ok(())
}
