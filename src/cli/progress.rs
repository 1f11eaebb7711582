//! Generation Progress Rendering
//!
//! Turns `GenerationPhase` updates into one status line per phase on stderr.

use std::sync::Arc;
use std::time::Instant;

use console::style;

use crate::report::{GenerationPhase, ProgressCallback};

const BAR_WIDTH: usize = 20;

/// Renders phases with elapsed time since construction
#[derive(Debug, Clone)]
pub struct PhaseRenderer {
    started: Instant,
}

impl Default for PhaseRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseRenderer {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// `None` for phases not worth a line
    pub fn render(&self, phase: GenerationPhase) -> Option<String> {
        let label = match phase {
            GenerationPhase::Idle | GenerationPhase::Done | GenerationPhase::Failed => return None,
            GenerationPhase::Estimating => "Estimating input size".to_string(),
            GenerationPhase::SinglePass => "Generating report in one pass".to_string(),
            GenerationPhase::Chunking => "Input too large, splitting into chunks".to_string(),
            GenerationPhase::ChunkLoop { current, total } => format!(
                "Chunk {}/{} {}",
                current,
                total,
                render_progress_bar(current - 1, total, BAR_WIDTH)
            ),
            GenerationPhase::CoherencePass => "Merging chunks".to_string(),
        };

        Some(format!(
            "{} {} {}",
            style("→").cyan(),
            label,
            style(format_millis(self.started.elapsed().as_millis() as u64)).dim()
        ))
    }

    pub fn into_callback(self) -> ProgressCallback {
        Arc::new(move |phase| {
            if let Some(line) = self.render(phase) {
                eprintln!("{}", line);
            }
        })
    }
}

/// Render a simple progress bar
pub fn render_progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }

    let progress = (completed as f32 / total as f32).min(1.0);
    let filled = (progress * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// `850ms`, `12.4s`, `3m 05s`
pub fn format_millis(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}
