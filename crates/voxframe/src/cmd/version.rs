use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("voxframe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: voxframe");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("VOXFRAME_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame: length_prefix={}B max_metadata={}B",
        voxframe_frame::LENGTH_PREFIX_SIZE,
        voxframe_frame::DEFAULT_MAX_METADATA
    );
    println!(
        "audio: sample_rate={}Hz chunk_samples={}",
        voxframe_channel::DEFAULT_SAMPLE_RATE,
        voxframe_channel::DEFAULT_CHUNK_SAMPLES
    );

    Ok(SUCCESS)
}
