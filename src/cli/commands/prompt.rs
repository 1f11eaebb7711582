//! Prompt Command
//!
//! Prints the exact messages a generation would send, for prompt review.
//!
//! Usage:
//!   reportforge prompt <report-id> [--notes notes.json] [--chunk N]

use std::path::PathBuf;

use crate::ai::prompt::{ChunkInfo, build_user_prompt};
use crate::cli::util::{CommandContext, GlobalOptions, read_section_notes};
use crate::report::{GenerationPlan, PlannedMethod};
use crate::service::GenerateReportRequest;
use crate::types::{ReportError, Result};

pub async fn run(
    global: &GlobalOptions,
    report_id: String,
    notes: Option<PathBuf>,
    chunk: Option<usize>,
) -> Result<()> {
    let ctx = CommandContext::load(global)?;
    let request = GenerateReportRequest {
        report_id,
        sections_content: notes.as_deref().map(read_section_notes).transpose()?,
        ..Default::default()
    };
    let (_, plan) = ctx.service().plan(&request).await?;

    let user_prompt = user_prompt_for(&plan, chunk)?;
    println!("=== SYSTEM ===\n{}\n\n=== USER ===\n{}", plan.system_prompt, user_prompt);
    Ok(())
}

/// User message for the whole input, or for chunk `index` (1-based) of a chunked plan
fn user_prompt_for(plan: &GenerationPlan, index: Option<usize>) -> Result<String> {
    match (&plan.method, index) {
        (PlannedMethod::SinglePass, None) => Ok(build_user_prompt(&plan.content, None)),
        (PlannedMethod::SinglePass, Some(_)) => Err(ReportError::Validation(
            "Report fits in a single pass; it has no chunks".to_string(),
        )),
        (PlannedMethod::Chunked(chunks), None) => Err(ReportError::Validation(format!(
            "Report is split into {} chunks; pick one with --chunk",
            chunks.len()
        ))),
        (PlannedMethod::Chunked(chunks), Some(index)) => {
            let chunk = index
                .checked_sub(1)
                .and_then(|i| chunks.get(i))
                .ok_or_else(|| {
                    ReportError::Validation(format!(
                        "Chunk {} out of range 1..={}",
                        index,
                        chunks.len()
                    ))
                })?;
            Ok(build_user_prompt(
                &chunk.text(),
                Some(ChunkInfo {
                    current: index,
                    total: chunks.len(),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Chunk, ChunkEntry};

    fn plan(method: PlannedMethod) -> GenerationPlan {
        GenerationPlan {
            system_prompt: "system".to_string(),
            content: "Verksamhet:\nLäger".to_string(),
            system_tokens: 1,
            content_tokens: 5,
            method,
        }
    }

    fn chunk(title: &str) -> Chunk {
        Chunk {
            entries: vec![ChunkEntry {
                section_id: title.to_lowercase(),
                title: title.to_string(),
                part: None,
                text: "text".to_string(),
            }],
        }
    }

    #[test]
    fn test_single_pass_prompt() {
        let prompt = user_prompt_for(&plan(PlannedMethod::SinglePass), None).unwrap();
        assert!(prompt.contains("Läger"));
        assert!(user_prompt_for(&plan(PlannedMethod::SinglePass), Some(1)).is_err());
    }

    #[test]
    fn test_chunk_prompt_selection() {
        let chunked = plan(PlannedMethod::Chunked(vec![chunk("A"), chunk("B")]));

        let prompt = user_prompt_for(&chunked, Some(2)).unwrap();
        assert!(prompt.contains("B:\ntext"));
        assert!(prompt.contains("del 2 av 2"));

        assert!(user_prompt_for(&chunked, None).is_err());
        assert!(user_prompt_for(&chunked, Some(0)).is_err());
        assert!(user_prompt_for(&chunked, Some(3)).is_err());
    }
}
