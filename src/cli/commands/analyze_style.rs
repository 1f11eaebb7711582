//! Analyze-Style Command
//!
//! Derives a style profile from a reference document.
//!
//! Usage:
//!   reportforge analyze-style --document <id> [--user <id>]
//!   reportforge analyze-style --file report-2023.txt

use std::path::PathBuf;

use crate::ai::{Credentials, create_client};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, GlobalOptions, load_config};
use crate::report::analyze_style;
use crate::types::Result;

/// Where the reference text comes from
#[derive(Debug, Clone)]
pub enum StyleSource {
    /// Stored reference document; the analysis is saved on it
    Document(String),
    /// Plain text file; the analysis is only printed
    File(PathBuf),
}

pub async fn run(global: &GlobalOptions, source: StyleSource, user_id: Option<String>) -> Result<()> {
    let out = Output::new(global.quiet);

    let analysis = match source {
        StyleSource::Document(document_id) => {
            let ctx = CommandContext::load(global)?;
            let analysis = ctx
                .service()
                .analyze_reference(&document_id, user_id.as_deref())
                .await?;
            ctx.save_store()?;
            out.success(&format!("Style analysis saved on {}", document_id));
            analysis
        }
        StyleSource::File(path) => {
            let config = load_config(global)?;
            let text = std::fs::read_to_string(&path)?;
            let client = create_client(&config.llm, &Credentials::from_env())?;
            let outcome = analyze_style(client.as_ref(), &text, &config.style_analysis).await?;
            out.field("Model", &outcome.model);
            out.field("Tokens", outcome.usage.total_tokens);
            outcome.analysis
        }
    };

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
