//! Output formatting for CLI

use console::style;
use meshstream_core::{LoadProgress, SessionState, StreamPlan, SyncResult};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Print serializable data as pretty JSON
pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Mesh segment")]
    url: String,
}

pub fn print_plan(plan: &StreamPlan, format: &OutputFormat) {
    println!("\nStream Plan:");
    println!("  Mime type: {}", plan.mime_type);
    println!("  Volumetric: {}", plan.is_volumetric());
    match plan.frame_rate_override {
        Some(fps) => println!("  Frame rate: {} fps", fps),
        None => println!("  Frame rate: native"),
    }
    println!(
        "  Video track: {}",
        plan.video_track_url.as_deref().unwrap_or("none")
    );
    println!("  Mesh segments: {}", plan.segment_count());

    if plan.mesh_segment_urls.is_empty() {
        return;
    }

    match format {
        OutputFormat::Table => {
            let rows = plan
                .mesh_segment_urls
                .iter()
                .enumerate()
                .map(|(index, url)| SegmentRow {
                    index,
                    url: url.clone(),
                });
            println!("\n{}", Table::new(rows));
        }
        _ => {
            for (i, url) in plan.mesh_segment_urls.iter().enumerate() {
                println!("    {}. {}", i, url);
            }
        }
    }
}

pub fn print_outcome(state: SessionState, progress: &LoadProgress, sync: Option<&SyncResult>) {
    println!("\nSession:");
    println!(
        "  Meshes: {}/{}",
        progress.current_count,
        progress
            .total_count
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    if progress.skipped_count() > 0 {
        println!("  Skipped: {}", style(progress.skipped_count()).yellow());
    }

    match sync {
        Some(result) => println!(
            "  Sync: {} meshes vs {} video frames ({})",
            result.mesh_count,
            result.video_frame_count,
            if result.matched {
                style("matched").green()
            } else {
                style("mismatched").red()
            }
        ),
        None => println!("  Sync: not evaluated"),
    }

    let state_label = match state {
        SessionState::Ready => style(state.to_string()).green().bold(),
        SessionState::Failed | SessionState::Mismatched => style(state.to_string()).red().bold(),
        _ => style(state.to_string()).yellow().bold(),
    };
    println!("  State: {}", state_label);
}
