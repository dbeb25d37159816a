use nrflink_frame::{inspect_frame, Frame};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = parse_frame(&args.hex)?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}

fn parse_frame(raw: &str) -> CliResult<Frame> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&digits)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))?;
    inspect_frame(&bytes).map_err(|err| frame_error("decode failed", err))
}
