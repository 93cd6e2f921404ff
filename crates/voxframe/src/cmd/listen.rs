use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use voxframe_channel::{ChannelError, PacketConfig, Reply, ServerConn, UnixTransport};
use voxframe_frame::FrameConfig;

use crate::cmd::ListenArgs;
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = bind(&args.path)?;
    tracing::info!(path = %args.path.display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let (stream, _) = listener
            .accept()
            .map_err(|err| io_error("accept failed", err))?;
        let transport = UnixTransport::from_unix(stream, PacketConfig::default())
            .map_err(|err| channel_error("accept failed", err))?;
        let mut conn = ServerConn::new(transport).with_frame_config(FrameConfig {
            max_metadata_size: args.max_metadata,
        });
        if let Some(prefix) = args.topic_prefix.clone() {
            conn = conn.with_join_policy(move |topic, _| topic_policy(&prefix, topic));
        }

        while running.load(Ordering::SeqCst) {
            let event = match conn.next_event() {
                Ok(event) => event,
                Err(ChannelError::ConnectionClosed) => {
                    tracing::info!("client disconnected");
                    break;
                }
                Err(ChannelError::Io(err)) => return Err(io_error("receive failed", err)),
                Err(err) if skips_message(&err) => {
                    tracing::warn!(error = %err, "rejected client message");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping client after stream error");
                    break;
                }
            };

            print_event(&event, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    cleanup(&args.path);
                    return Ok(SUCCESS);
                }
            }
        }
    }

    cleanup(&args.path);
    Ok(SUCCESS)
}

fn bind(path: &Path) -> CliResult<UnixListener> {
    UnixListener::bind(path)
        .map_err(|err| io_error(&format!("bind failed for {}", path.display()), err))
}

fn cleanup(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::debug!(error = %err, "socket file not removed");
    }
}

/// Errors raised after the offending message was fully consumed; the
/// connection can carry on with the next one.
fn skips_message(err: &ChannelError) -> bool {
    matches!(
        err,
        ChannelError::Json(_)
            | ChannelError::Frame(_)
            | ChannelError::InvalidText(_)
            | ChannelError::NotJoined(_)
    )
}

fn topic_policy(prefix: &str, topic: &str) -> Reply {
    if topic.starts_with(prefix) {
        Reply::Ok(Value::Object(Default::default()))
    } else {
        Reply::Error(json!({"reason": "unauthorized"}))
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
