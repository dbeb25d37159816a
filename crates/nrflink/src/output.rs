use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nrflink_frame::{crc32, Frame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    sender: String,
    frame_type: &'a str,
    sequence: u32,
    payload_size: usize,
    payload: String,
    crc: String,
    wire_size: usize,
    wire: String,
    timestamp: String,
}

/// Print one frame with its wire encoding.
pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let wire = frame.encode();
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                sender: frame.sender.to_string(),
                frame_type: frame.frame_type.name(),
                sequence: frame.sequence,
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.payload.as_ref()),
                crc: format!("{:#010x}", crc32(&frame.payload)),
                wire_size: wire.len(),
                wire: hex::encode(&wire),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SENDER", "TYPE", "SEQ", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.sender.to_string(),
                    frame.frame_type.name().to_string(),
                    frame.sequence.to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sender={} type={} seq={} size={} payload={} wire={}",
                frame.sender,
                frame.frame_type,
                frame.sequence,
                frame.payload.len(),
                payload_preview(frame.payload.as_ref()),
                hex::encode(&wire)
            );
        }
        OutputFormat::Raw => {
            print_raw(&wire);
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationSummary {
    pub transmitters: usize,
    pub paired: usize,
    pub sent: usize,
    pub acknowledged: usize,
    pub delivered: usize,
    pub evicted: usize,
}

pub fn print_summary(summary: &SimulationSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TX", "PAIRED", "SENT", "ACKED", "DELIVERED", "EVICTED"])
                .add_row(vec![
                    summary.transmitters.to_string(),
                    summary.paired.to_string(),
                    summary.sent.to_string(),
                    summary.acknowledged.to_string(),
                    summary.delivered.to_string(),
                    summary.evicted.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "transmitters={} paired={} sent={} acknowledged={} delivered={} evicted={}",
                summary.transmitters,
                summary.paired,
                summary.sent,
                summary.acknowledged,
                summary.delivered,
                summary.evicted
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes: {}>", payload.len(), hex::encode(payload)),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
