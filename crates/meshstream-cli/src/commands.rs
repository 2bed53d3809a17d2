//! CLI command implementations

use crate::output::{self, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use meshstream_core::{
    Collaborators, GlbDecoder, HttpManifestFetcher, LoadProgress, LoadReport, ManifestFetcher,
    ManifestParser, MeshCollection, Mp4ProbeVideo, RecordingDriver, SegmentSink, SessionId,
    SessionState, StreamConfig, StreamEventRecord, StreamOrchestrator, StreamPlan, SyncResult,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Defaults, overridden by the `--config` file when given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StreamConfig> {
    let config = match path {
        Some(path) => StreamConfig::from_json_file(path)?,
        None => StreamConfig::default(),
    };
    debug!(?config, "Configuration loaded");
    Ok(config)
}

/// Fetch and parse a manifest
pub async fn inspect(
    config: &StreamConfig,
    base_url: &str,
    manifest: &str,
    format: &str,
) -> anyhow::Result<()> {
    let fetcher = HttpManifestFetcher::new(config)?;
    let content = fetcher.fetch(base_url, manifest).await?;
    let plan = ManifestParser::new(base_url).parse(&content)?;

    let format = OutputFormat::from(format);
    if let OutputFormat::Json = format {
        return output::print_json(&plan);
    }

    println!("Inspecting manifest: {}/{}", base_url, manifest);
    output::print_plan(&plan, &format);
    Ok(())
}

#[derive(Serialize)]
struct PlayReport {
    session_id: SessionId,
    state: SessionState,
    plan: Option<StreamPlan>,
    progress: LoadProgress,
    sync: Option<SyncResult>,
    load: Option<LoadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<StreamEventRecord>>,
}

/// Run a full session. Returns false when it ends `Failed` or `Mismatched`.
pub async fn play(
    config: &StreamConfig,
    base_url: &str,
    manifest: &str,
    show_events: bool,
    format: &str,
) -> anyhow::Result<bool> {
    let format = OutputFormat::from(format);
    let quiet = matches!(format, OutputFormat::Json);

    let sink = Arc::new(MeshCollection::new());
    let collaborators = Collaborators {
        fetcher: Arc::new(HttpManifestFetcher::new(config)?),
        decoder: Arc::new(GlbDecoder::new(config)?),
        sink: sink.clone(),
        video: Arc::new(Mp4ProbeVideo::new(config)?),
        driver: Arc::new(RecordingDriver::new()),
    };

    let orchestrator = StreamOrchestrator::new(config.clone(), collaborators)?;
    orchestrator.set_manifest_url(base_url, manifest).await;

    if !quiet {
        println!("Playing: {}/{}", base_url, manifest);
    }

    let (session, handle) = orchestrator.activate().await?;
    let mut progress = session.subscribe_progress();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} segments {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏"),
    );
    pb.set_message("Fetching manifest");

    let outcome = match handle {
        Some(mut handle) => loop {
            tokio::select! {
                result = &mut handle => break result?,
                changed = progress.changed() => {
                    if changed.is_err() {
                        break (&mut handle).await?;
                    }
                    let snapshot = progress.borrow_and_update().clone();
                    if let Some(total) = snapshot.total_count {
                        pb.set_length(total as u64);
                        pb.set_message("Loading meshes");
                    }
                    pb.set_position(snapshot.current_count as u64);
                }
            }
        },
        None => Ok(session.state().await),
    };

    let state = match outcome {
        Ok(state) => state,
        Err(e) => {
            pb.abandon_with_message("failed");
            if !quiet {
                eprintln!("Error: {}", e);
            }
            session.state().await
        }
    };
    pb.finish_and_clear();

    let snapshot = session.progress();
    let sync = session.sync_result().await;

    if quiet {
        let report = PlayReport {
            session_id: session.id(),
            state,
            plan: session.plan().await,
            progress: snapshot,
            sync,
            load: session.load_report().await,
            events: if show_events {
                Some(session.events().await)
            } else {
                None
            },
        };
        output::print_json(&report)?;
    } else {
        if let Some(plan) = session.plan().await {
            output::print_plan(&plan, &format);
        }
        output::print_outcome(state, &snapshot, sync.as_ref());
        println!("  Meshes in sink: {}", sink.mesh_count());

        if show_events {
            println!("\nEvents:");
            for record in session.events().await {
                println!("  [{}] {}", record.sequence, serde_json::to_string(&record.event)?);
            }
        }
    }

    orchestrator.teardown().await;

    Ok(!matches!(state, SessionState::Failed | SessionState::Mismatched))
}
