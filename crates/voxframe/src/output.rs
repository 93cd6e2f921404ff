use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use voxframe_channel::ServerEvent;
use voxframe_frame::DecodedFrame;

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
    source: &'a str,
    frame_size: usize,
    metadata_len: usize,
    metadata: &'a Value,
    payload_size: usize,
    payload: String,
}

pub fn print_frame(frame: &DecodedFrame, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                source,
                frame_size: frame.wire_size(),
                metadata_len: frame.metadata_len,
                metadata: &frame.metadata,
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.payload.as_ref()),
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
                .set_header(vec!["FRAME", "METADATA LEN", "METADATA", "PAYLOAD"])
                .add_row(vec![
                    frame.wire_size().to_string(),
                    frame.metadata_len.to_string(),
                    frame.metadata.to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "source={} frame={} metadata_len={} metadata={} payload={}",
                source,
                frame.wire_size(),
                frame.metadata_len,
                frame.metadata,
                payload_preview(frame.payload.as_ref())
            );
        }
        OutputFormat::Raw => print_raw(frame.payload.as_ref()),
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    kind: &'static str,
    topic: &'a str,
    event: &'a str,
    #[serde(rename = "ref")]
    reference: Option<u64>,
    payload: Value,
    payload_size: Option<usize>,
    timestamp: String,
}

pub fn print_event(event: &ServerEvent, format: OutputFormat) {
    let out = match event {
        ServerEvent::Structured(env) => EventOutput {
            kind: "structured",
            topic: &env.topic,
            event: &env.event,
            reference: env.reference,
            payload: env.payload.clone(),
            payload_size: None,
            timestamp: now_unix_seconds(),
        },
        ServerEvent::Binary {
            context,
            info,
            payload,
        } => EventOutput {
            kind: "binary",
            topic: &context.topic,
            event: &context.event,
            reference: context.reference,
            payload: info.clone(),
            payload_size: Some(payload.len()),
            timestamp: now_unix_seconds(),
        },
    };

    match format {
        OutputFormat::Json => {
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
                .set_header(vec!["KIND", "TOPIC", "EVENT", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    out.kind.to_string(),
                    out.topic.to_string(),
                    out.event.to_string(),
                    out.payload_size
                        .map(|size| size.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    out.payload.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} topic={} event={} size={} payload={}",
                out.kind,
                out.topic,
                out.event,
                out.payload_size
                    .map(|size| size.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                out.payload
            );
        }
        OutputFormat::Raw => match event {
            ServerEvent::Binary { payload, .. } => print_raw(payload.as_ref()),
            ServerEvent::Structured(env) => println!("{}", env.payload),
        },
    }
}

/// Print a flat command report. `rows` mirrors the report's fields for
/// table and pretty output.
pub fn print_report<T: Serialize>(report: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = rows
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
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
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
