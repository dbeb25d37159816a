use clap::{Args, Subcommand, ValueEnum};

use nrflink_frame::FrameType;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame and print its wire bytes.
    Encode(EncodeArgs),
    /// Decode hex wire bytes into a frame.
    Decode(DecodeArgs),
    /// Pair transmitters with a receiver over a simulated air medium.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FrameKind {
    Pairing,
    Data,
    Heartbeat,
    Ack,
}

impl From<FrameKind> for FrameType {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Pairing => FrameType::Pairing,
            FrameKind::Data => FrameType::Data,
            FrameKind::Heartbeat => FrameType::Heartbeat,
            FrameKind::Ack => FrameType::Ack,
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Sender identity (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_id)]
    pub sender: u32,
    /// Frame type.
    #[arg(long = "type", value_enum, default_value = "data")]
    pub kind: FrameKind,
    /// Sequence number.
    #[arg(long, default_value = "0")]
    pub seq: u32,
    /// UTF-8 payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex. Whitespace and ':' separators are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of transmitters to pair.
    #[arg(long, short = 't', default_value = "2")]
    pub transmitters: u32,
    /// Reliable messages each transmitter sends.
    #[arg(long, short = 'n', default_value = "3")]
    pub messages: u32,
    /// Receiver identity (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_id, default_value = "0xBEEF")]
    pub receiver: u32,
    /// RF channel, 0-125.
    #[arg(long, default_value = "7")]
    pub channel: u8,
    /// Probability that any single delivery is lost, 0.0-1.0.
    #[arg(long, value_parser = parse_rate, default_value = "0")]
    pub loss: f64,
    /// Seed for the loss pattern.
    #[arg(long, default_value = "1")]
    pub seed: u64,
    /// Attempts per reliable send.
    #[arg(long, default_value = "5")]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_id(raw: &str) -> Result<u32, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => raw.parse::<u32>(),
    };
    parsed.map_err(|err| format!("invalid device id '{raw}': {err}"))
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw
        .parse()
        .map_err(|err| format!("invalid rate '{raw}': {err}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("rate {rate} outside 0.0-1.0"))
    }
}
