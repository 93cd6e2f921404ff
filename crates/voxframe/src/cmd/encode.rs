use serde::Serialize;
use serde_json::Value;

use crate::cmd::{read_input, EncodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_raw, print_report, OutputFormat};

#[derive(Serialize)]
struct EncodeReport {
    path: String,
    frame_size: usize,
    metadata_len: usize,
    payload_size: usize,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let metadata: Value = serde_json::from_str(&args.meta)
        .map_err(|err| CliError::new(USAGE, format!("--meta is not valid JSON: {err}")))?;
    let payload = resolve_payload(&args)?;

    let frame =
        voxframe_frame::encode(&metadata, &payload).map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(frame_size = frame.len(), payload_size = payload.len(), "frame encoded");

    let Some(path) = &args.out else {
        print_raw(&frame);
        return Ok(SUCCESS);
    };

    std::fs::write(path, &frame)
        .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;

    let report = EncodeReport {
        path: path.display().to_string(),
        frame_size: frame.len(),
        metadata_len: frame.len() - voxframe_frame::LENGTH_PREFIX_SIZE - payload.len(),
        payload_size: payload.len(),
    };
    print_report(
        &report,
        &[
            ("path", report.path.clone()),
            ("frame_size", report.frame_size.to_string()),
            ("metadata_len", report.metadata_len.to_string()),
            ("payload_size", report.payload_size.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return read_input(path);
    }
    Ok(Vec::new())
}
