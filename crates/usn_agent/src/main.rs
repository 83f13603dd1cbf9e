use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use fsutil_capture::FsutilClient;
use tracing::{error, info};
use usn_agent::{
    CapturePipeline, FsutilPathResolver, JsonLineSink, PipelineConfig, SessionOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "usn-agent")]
#[command(about = "Streams USN change-journal records from fsutil into structured JSON events")]
struct Cli {
    /// Volume to watch, e.g. "C:"
    #[arg(long, default_value = "C:")]
    volume: String,

    /// Resolve absolute file paths via the parent directory id (one extra
    /// fsutil query per record)
    #[arg(long)]
    complete_filenames: bool,

    /// Location of the persisted resume cursor
    #[arg(long, default_value = "last_usn.txt")]
    cursor_file: PathBuf,

    /// Capacity of the bounded capture-to-decode line channel
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,

    /// Seconds to wait for fsutil to exit after a shutdown request
    #[arg(long, default_value_t = 2)]
    shutdown_timeout_secs: u64,

    /// Seconds allowed per path-resolution query
    #[arg(long, default_value_t = 5)]
    enrich_timeout_secs: u64,

    /// Ignore the stored cursor and follow the live journal tail
    #[arg(long)]
    from_now: bool,

    /// fsutil binary override (the FSUTIL_BINARY env var is also honored)
    #[arg(long)]
    fsutil_binary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = FsutilClient::builder();
    if let Some(binary) = &cli.fsutil_binary {
        builder = builder.binary(binary.clone());
    }
    let client = builder.build();

    let config = PipelineConfig {
        volume: cli.volume,
        cursor_path: cli.cursor_file,
        channel_capacity: cli.channel_capacity,
        shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
        from_now: cli.from_now,
    };

    let (mut pipeline, shutdown) =
        CapturePipeline::new(config, client.clone(), Box::new(JsonLineSink::stdout()));
    if cli.complete_filenames {
        pipeline = pipeline.with_resolver(Box::new(FsutilPathResolver::new(
            client,
            Duration::from_secs(cli.enrich_timeout_secs),
            tokio::runtime::Handle::current(),
        )));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, draining capture session");
            shutdown.shutdown();
        }
    });

    let report = pipeline.run().await;
    info!(
        headers = report.counters.headers_decoded,
        emitted = report.counters.records_emitted,
        skipped = report.counters.records_skipped,
        sink_failures = report.counters.sink_failures,
        enrichment_failures = report.counters.enrichment_failures,
        "capture session finished"
    );

    match report.outcome {
        SessionOutcome::Faulted(err) => {
            error!(error = %err, "capture session failed");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}
