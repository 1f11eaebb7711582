//! Generate Command
//!
//! Runs the full generation workflow for one stored report.
//!
//! Usage:
//!   reportforge generate <report-id> [--notes notes.json] [--instructions ".."] [-o out.md] [--json]

use std::path::PathBuf;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::progress::{PhaseRenderer, format_millis};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, GlobalOptions, read_section_notes, write_or_print};
use crate::service::GenerateReportRequest;
use crate::types::Result;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub report_id: String,
    pub user_id: Option<String>,
    /// JSON file replacing the stored section notes
    pub notes: Option<PathBuf>,
    pub instructions: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(global: &GlobalOptions, options: GenerateOptions) -> Result<()> {
    let ctx = CommandContext::load(global)?;
    let out = Output::new(global.quiet);

    let request = GenerateReportRequest {
        report_id: options.report_id,
        user_id: options.user_id,
        sections_content: options.notes.as_deref().map(read_section_notes).transpose()?,
        custom_instructions: options.instructions,
    };

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone(), out);
    let progress = (!global.quiet).then(|| PhaseRenderer::new().into_callback());

    let service = ctx.service();
    let outcome = service.generate_report(&request, cancel, progress).await;
    watcher.abort();

    // Status is either saved for review or reverted to draft; both must reach disk.
    ctx.save_store()?;
    let result = outcome?;

    out.success("Report generated");
    out.field("Method", result.metadata.processing_method);
    out.field("Chunks", result.metadata.chunks);
    out.field("Tokens", result.metadata.total_tokens);
    out.field("Model", &result.metadata.model);
    out.field("Time", format_millis(result.metadata.generation_time_ms));

    let rendered = if options.json {
        serde_json::to_string_pretty(&result)?
    } else {
        result.content
    };
    write_or_print(options.output.as_deref(), &rendered)?;
    if let Some(path) = &options.output {
        out.info(&format!("Written to {}", path.display()));
    }
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken, out: Output) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            out.warning("Interrupted, cancelling generation");
            token.cancel();
        }
    })
}
