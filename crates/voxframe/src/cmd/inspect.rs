use bytes::Bytes;

use crate::cmd::{read_input, InspectArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = Bytes::from(read_input(&args.path)?);
    let frame = voxframe_frame::decode(&raw, args.max_metadata)
        .map_err(|err| frame_error("decode failed", err))?;

    print_frame(&frame, &args.path.display().to_string(), format);
    Ok(SUCCESS)
}
