//! Regenerate-Section Command
//!
//! Rewrites one section of a generated report and prints the new text.
//! The stored report is left unchanged; only the usage record is saved.
//!
//! Usage:
//!   reportforge regenerate-section <report-id> <section-id> [--feedback ".."] [-o out.md]

use std::path::PathBuf;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, GlobalOptions, write_or_print};
use crate::service::RegenerateSectionRequest;
use crate::types::Result;

pub async fn run(
    global: &GlobalOptions,
    request: RegenerateSectionRequest,
    output: Option<PathBuf>,
) -> Result<()> {
    let ctx = CommandContext::load(global)?;
    let out = Output::new(global.quiet);

    let completion = ctx.service().regenerate_section(&request).await?;
    ctx.save_store()?;

    out.success(&format!("Section {} regenerated", request.section_id));
    out.field("Model", &completion.model);
    out.field("Tokens", completion.usage.total_tokens);

    write_or_print(output.as_deref(), &completion.content)
}
