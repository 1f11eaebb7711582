//! Plan Command
//!
//! Dry run of a generation: token estimate, processing method and chunk
//! layout. Makes no LLM call and changes nothing.
//!
//! Usage:
//!   reportforge plan <report-id> [--notes notes.json] [--json]

use std::path::PathBuf;

use serde_json::json;

use crate::ai::TokenCounter;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, GlobalOptions, read_section_notes};
use crate::report::{GenerationPlan, PlannedMethod};
use crate::service::GenerateReportRequest;
use crate::types::Result;

pub async fn run(
    global: &GlobalOptions,
    report_id: String,
    notes: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ctx = CommandContext::load(global)?;
    let request = GenerateReportRequest {
        report_id,
        sections_content: notes.as_deref().map(read_section_notes).transpose()?,
        ..Default::default()
    };

    let (prepared, plan) = ctx.service().plan(&request).await?;
    let limit = ctx.config.generation.safe_input_limit;
    let max_per_chunk = ctx.config.generation.max_tokens_per_chunk;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan_json(&plan, limit))?);
        return Ok(());
    }

    // Plan output is the command's result, so it ignores --quiet.
    let out = Output::new(false);
    out.section(&format!("Plan for {}", prepared.report.title));
    out.field("Sections", prepared.inputs.len());
    out.field("System tokens", plan.system_tokens);
    out.field("Content tokens", plan.content_tokens);
    out.field("Safe input limit", limit);

    match &plan.method {
        PlannedMethod::SinglePass => out.field("Method", "single pass"),
        PlannedMethod::Chunked(chunks) => {
            out.field("Method", "chunked");
            out.field("Chunks", chunks.len());
            let merge = ctx.config.generation.coherence.applies_to(chunks.len());
            out.field("Coherence pass", if merge { "yes" } else { "no" });

            let counter = TokenCounter::fallback();
            for (i, chunk) in chunks.iter().enumerate() {
                let tokens = chunk.estimated_tokens(&counter, plan.system_tokens);
                let over = if tokens > max_per_chunk { " (over budget)" } else { "" };
                eprintln!("\n  Chunk {} ~{} tokens{}", i + 1, tokens, over);
                for entry in &chunk.entries {
                    eprintln!("    - {}", entry.display_title());
                }
            }
        }
    }
    Ok(())
}

fn plan_json(plan: &GenerationPlan, limit: usize) -> serde_json::Value {
    let chunks: Vec<_> = match &plan.method {
        PlannedMethod::SinglePass => Vec::new(),
        PlannedMethod::Chunked(chunks) => chunks
            .iter()
            .map(|c| {
                json!({
                    "sections": c.entries.iter().map(|e| e.display_title().into_owned()).collect::<Vec<_>>(),
                })
            })
            .collect(),
    };
    json!({
        "system_tokens": plan.system_tokens,
        "content_tokens": plan.content_tokens,
        "estimated_tokens": plan.estimated_tokens(),
        "safe_input_limit": limit,
        "method": if chunks.is_empty() { "single_pass" } else { "chunked" },
        "chunk_count": plan.chunk_count(),
        "chunks": chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Chunk, ChunkEntry};

    fn plan(method: PlannedMethod) -> GenerationPlan {
        GenerationPlan {
            system_prompt: String::new(),
            content: String::new(),
            system_tokens: 500,
            content_tokens: 120,
            method,
        }
    }

    #[test]
    fn test_plan_json_single_pass() {
        let value = plan_json(&plan(PlannedMethod::SinglePass), 100_000);
        assert_eq!(value["method"], "single_pass");
        assert_eq!(value["estimated_tokens"], 620);
        assert_eq!(value["chunk_count"], 1);
    }

    #[test]
    fn test_plan_json_lists_chunk_sections() {
        let chunk = Chunk {
            entries: vec![ChunkEntry {
                section_id: "1".to_string(),
                title: "Verksamhet".to_string(),
                part: None,
                text: "Läger".to_string(),
            }],
        };
        let value = plan_json(&plan(PlannedMethod::Chunked(vec![chunk.clone(), chunk])), 10);
        assert_eq!(value["method"], "chunked");
        assert_eq!(value["chunk_count"], 2);
        assert_eq!(value["chunks"][1]["sections"][0], "Verksamhet");
    }
}
