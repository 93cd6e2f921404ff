use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use voxframe_channel::{
    bytes_to_samples, CaptureConfig, CaptureSession, ChannelState, PacketConfig, SocketConfig,
    Socket, UnixTransport,
};

use crate::cmd::{read_input, StreamArgs};
use crate::exit::{channel_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_report, OutputFormat};

#[derive(Serialize)]
struct StreamReport {
    topic: String,
    event: String,
    sample_rate: u32,
    samples: usize,
    chunks: u64,
    duration_ms: u64,
}

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let info = match &args.info {
        Some(raw) => serde_json::from_str::<Value>(raw)
            .map_err(|err| CliError::new(USAGE, format!("--info is not valid JSON: {err}")))?,
        None => Value::Object(Default::default()),
    };
    let samples = bytes_to_samples(&read_input(&args.input)?)
        .map_err(|err| channel_error("invalid PCM input", err))?;

    let packet_config = PacketConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..PacketConfig::default()
    };
    let transport = UnixTransport::connect_unix(&args.path, packet_config)
        .map_err(|err| channel_error("connect failed", err))?;

    let mut socket_config = SocketConfig::default();
    if let Some(token) = &args.csrf_token {
        socket_config = socket_config.with_csrf_token(token.as_str());
    }
    let mut socket =
        Socket::connect(transport, socket_config).map_err(|err| channel_error("connect failed", err))?;

    socket
        .join(&args.topic, Value::Null, |reply| {
            if !reply.is_ok() {
                tracing::warn!(response = %reply.response(), "join refused");
            }
        })
        .map_err(|err| channel_error("join failed", err))?;
    let state = socket
        .poll_until_settled(&args.topic)
        .map_err(|err| channel_error("join failed", err))?;
    if state != ChannelState::Joined {
        return Err(CliError::new(
            FAILURE,
            format!("join refused for topic '{}'", args.topic),
        ));
    }

    let mut session = CaptureSession::new();
    session
        .start(CaptureConfig {
            event: args.event.clone(),
            sample_rate: args.sample_rate,
            chunk_samples: args.chunk_samples,
            info,
            ..CaptureConfig::new(args.topic.clone())
        })
        .map_err(|err| CliError::new(USAGE, err.to_string()))?;

    for chunk in samples.chunks(args.chunk_samples) {
        session
            .push_chunk(&mut socket, chunk)
            .map_err(|err| channel_error("push failed", err))?;
    }
    let chunks = session
        .stop()
        .map_err(|err| channel_error("stream failed", err))?;

    socket
        .leave(&args.topic)
        .map_err(|err| channel_error("leave failed", err))?;

    let report = StreamReport {
        topic: args.topic.clone(),
        event: args.event.clone(),
        sample_rate: args.sample_rate,
        samples: samples.len(),
        chunks,
        duration_ms: audio_duration_ms(samples.len(), args.sample_rate),
    };
    print_report(
        &report,
        &[
            ("topic", report.topic.clone()),
            ("event", report.event.clone()),
            ("sample_rate", report.sample_rate.to_string()),
            ("samples", report.samples.to_string()),
            ("chunks", report.chunks.to_string()),
            ("duration_ms", report.duration_ms.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn audio_duration_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (samples as u64).saturating_mul(1000) / u64::from(sample_rate)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
