//! Submit a video through a relay and watch the annotation job to completion.
//!
//! ```bash
//! cargo run --example watch -- --relay http://127.0.0.1:8001 clip.mp4
//! ```

use clap::Parser;
use jobwatch::{HttpRelayClient, JobWatcher, VideoUpload, WatchState};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Drive an annotation job through a fallgate relay")]
struct Cli {
    /// Base URL of the relay
    #[arg(long, default_value = "http://127.0.0.1:8001")]
    relay: String,

    /// Video file to annotate
    video: PathBuf,

    /// Also persist the raw upload to the relay's bucket
    #[arg(long)]
    persist: bool,

    /// Where to write the annotated video
    #[arg(long, default_value = "annotated.mp4")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("jobwatch=debug,info")
        .init();

    let cli = Cli::parse();
    let bytes = std::fs::read(&cli.video)?;
    let filename = cli
        .video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video.mp4".to_string());

    let client = HttpRelayClient::new(cli.relay.parse()?);
    let mut watcher = JobWatcher::new(client);
    let mut states = watcher.subscribe();

    watcher.start(VideoUpload::new(bytes, filename).with_persistence(cli.persist));

    loop {
        states.changed().await?;
        let state = states.borrow_and_update().clone();
        match state {
            WatchState::Submitting => println!("submitting..."),
            WatchState::Polling {
                progress: Some(progress),
                ..
            } => match progress.percent {
                Some(percent) => println!("processing: {percent:.0}%"),
                None => println!("processing: {} frames", progress.processed),
            },
            WatchState::Downloading { job_id } => println!("job {job_id} done, downloading..."),
            WatchState::Complete { video, .. } => {
                std::fs::write(&cli.output, &video)?;
                println!("saved {} ({} bytes)", cli.output.display(), video.len());
                break;
            }
            WatchState::Failed { error } => {
                eprintln!("job failed: {error}");
                std::process::exit(1);
            }
            _ => {}
        }
    }

    Ok(())
}
