use nrflink_frame::{DeviceId, Frame, FrameType, MAX_PAYLOAD_SIZE};
use tracing::warn;

use crate::cmd::EncodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = build_frame(&args)?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}

fn build_frame(args: &EncodeArgs) -> CliResult<Frame> {
    let payload = match (&args.data, &args.hex) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(digits)) => hex::decode(digits.trim())
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex payload: {err}")))?,
        (None, None) => Vec::new(),
    };

    let mut frame = Frame::new(
        DeviceId(args.sender),
        FrameType::from(args.kind),
        args.seq,
        payload,
    );
    if frame.payload.len() > MAX_PAYLOAD_SIZE {
        warn!(
            size = frame.payload.len(),
            max = MAX_PAYLOAD_SIZE,
            "payload truncated to fit one frame"
        );
        frame.payload.truncate(MAX_PAYLOAD_SIZE);
    }
    Ok(frame)
}
