mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nrflink", version, about = "2.4GHz point-to-multipoint link tools")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "NRFLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::FrameKind;

    #[test]
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from([
            "nrflink", "encode", "--sender", "0xCAFE", "--type", "heartbeat", "--seq", "4",
        ])
        .expect("encode args should parse");

        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.sender, 0xCAFE);
                assert_eq!(args.kind, FrameKind::Heartbeat);
                assert_eq!(args.seq, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "nrflink", "encode", "--sender", "1", "--data", "hi", "--hex", "00",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_out_of_range_loss() {
        let err = Cli::try_parse_from(["nrflink", "simulate", "--loss", "2"])
            .expect_err("loss above 1 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_simulate_defaults() {
        let cli = Cli::try_parse_from(["nrflink", "simulate"]).expect("defaults should parse");
        match cli.command {
            Command::Simulate(args) => {
                assert_eq!(args.transmitters, 2);
                assert_eq!(args.receiver, 0xBEEF);
                assert_eq!(args.channel, 7);
                assert_eq!(args.loss, 0.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
