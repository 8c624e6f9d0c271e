//! Transfer framing and integrity
//!
//! A transfer is a metadata frame (`File|<total_packets>|<name>`), the
//! raw data chunks, and a `CRC32|<8 hex digits>` trailer the receiver
//! checks against its own checksum of the accumulated bytes. The receiver
//! acknowledges the metadata with `ACK_FILE_INFO`. All frames ride as
//! opaque payloads on the reliable connection.

use crc::{Crc, CRC_32_ISO_HDLC};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

pub const METADATA_PREFIX: &str = "File|";
pub const CRC_PREFIX: &str = "CRC32|";
pub const METADATA_ACK: &str = "ACK_FILE_INFO";

/// CRC-32/ISO-HDLC: polynomial 0xEDB88320 (reflected), init 0xFFFFFFFF,
/// final xor 0xFFFFFFFF.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Checksum a whole file, streaming.
pub fn file_crc32<P: AsRef<Path>>(path: P) -> io::Result<u32> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut digest = CRC32.digest();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finalize())
}

/// One parsed transfer frame.
///
/// Anything that does not carry a recognized text prefix is a data chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Metadata { total_packets: u64, name: String },
    Checksum(u32),
    MetadataAck,
    Data(&'a [u8]),
}

impl<'a> Frame<'a> {
    /// Classify a received payload.
    pub fn parse(payload: &'a [u8]) -> Frame<'a> {
        // Text frames may arrive zero-padded; data chunks are raw.
        let trimmed = trim_trailing_zeros(payload);

        if let Ok(text) = std::str::from_utf8(trimmed) {
            if let Some(rest) = text.strip_prefix(METADATA_PREFIX) {
                if let Some((total, name)) = rest.split_once('|') {
                    if let Ok(total_packets) = total.parse::<u64>() {
                        if !name.is_empty() {
                            return Frame::Metadata {
                                total_packets,
                                name: name.to_string(),
                            };
                        }
                    }
                }
            } else if let Some(hex) = text.strip_prefix(CRC_PREFIX) {
                if hex.len() == 8 {
                    if let Ok(value) = u32::from_str_radix(hex, 16) {
                        return Frame::Checksum(value);
                    }
                }
            } else if text == METADATA_ACK {
                return Frame::MetadataAck;
            }
        }

        Frame::Data(payload)
    }
}

/// Encode the metadata frame, zero-padded to `packet_size`.
pub fn encode_metadata(total_packets: u64, name: &str, packet_size: usize) -> Vec<u8> {
    let mut frame = format!("{}{}|{}", METADATA_PREFIX, total_packets, name).into_bytes();
    frame.truncate(packet_size);
    frame.resize(packet_size, 0);
    frame
}

/// Encode the CRC trailer frame.
pub fn encode_checksum(value: u32) -> Vec<u8> {
    format!("{}{:08X}", CRC_PREFIX, value).into_bytes()
}

/// Encode the metadata acknowledgement frame.
pub fn encode_metadata_ack() -> Vec<u8> {
    METADATA_ACK.as_bytes().to_vec()
}

fn trim_trailing_zeros(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    &payload[..end]
}

/// Reads a file as fixed-size chunks.
///
/// Every chunk is `packet_size` bytes except the last, which carries only
/// the remaining bytes so the receiver accumulates exactly the file.
pub struct FileChunker {
    reader: BufReader<File>,
    packet_size: usize,
    done: bool,
}

/// Size figures announced in the metadata frame.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    pub file_size: u64,
    pub total_packets: u64,
}

impl FileChunker {
    /// Open `path` for chunked reading at `packet_size` bytes per chunk.
    pub fn open<P: AsRef<Path>>(path: P, packet_size: usize) -> io::Result<(Self, FileInfo)> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let total_packets = file_size.div_ceil(packet_size as u64);

        Ok((
            FileChunker {
                reader: BufReader::new(file),
                packet_size,
                done: false,
            },
            FileInfo {
                file_size,
                total_packets,
            },
        ))
    }

    /// Read the next chunk; `None` after the final chunk.
    pub fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk = vec![0u8; self.packet_size];
        let mut filled = 0;
        while filled < self.packet_size {
            let n = self.reader.read(&mut chunk[filled..])?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        chunk.truncate(filled);
        Ok(Some(chunk))
    }
}
