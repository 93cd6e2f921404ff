use clap::{Args, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use voxframe_channel::{DEFAULT_AUDIO_EVENT, DEFAULT_CHUNK_SAMPLES, DEFAULT_SAMPLE_RATE};
use voxframe_frame::DEFAULT_MAX_METADATA;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod encode;
pub mod inspect;
pub mod listen;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode metadata and a payload into one frame.
    Encode(EncodeArgs),
    /// Decode a frame and print its metadata and payload.
    Inspect(InspectArgs),
    /// Accept channel clients and print the events they push.
    Listen(ListenArgs),
    /// Stream f32 PCM audio to a channel server as binary frames.
    Stream(StreamArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Stream(args) => stream::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON metadata.
    #[arg(long, default_value = "{}")]
    pub meta: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file ("-" for stdin).
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Write the frame to a file and print a report instead of raw bytes.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Frame file to decode ("-" for stdin).
    pub path: PathBuf,
    /// Largest metadata segment accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_METADATA, env = "VOXFRAME_MAX_METADATA")]
    pub max_metadata: usize,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Refuse joins on topics that do not start with this prefix.
    #[arg(long)]
    pub topic_prefix: Option<String>,
    /// Largest frame metadata segment accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_METADATA, env = "VOXFRAME_MAX_METADATA")]
    pub max_metadata: usize,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Topic to join and push audio on.
    #[arg(long, short = 't')]
    pub topic: String,
    /// Raw little-endian f32 mono PCM ("-" for stdin).
    #[arg(long, short = 'i')]
    pub input: PathBuf,
    /// Event name for audio pushes.
    #[arg(long, default_value = DEFAULT_AUDIO_EVENT)]
    pub event: String,
    /// Sample rate of the input in Hz.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,
    /// Samples per pushed frame.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SAMPLES)]
    pub chunk_samples: usize,
    /// JSON info merged into each frame's metadata.
    #[arg(long)]
    pub info: Option<String>,
    /// CSRF token sent with the connect params.
    #[arg(long, env = "VOXFRAME_CSRF_TOKEN")]
    pub csrf_token: Option<String>,
    /// Maximum time to wait for the join reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Read a whole file, or stdin when the path is "-".
pub fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("failed reading stdin", err))?;
        return Ok(buf);
    }
    std::fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
}
