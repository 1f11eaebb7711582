//! Single-section regeneration

use tracing::{info, instrument};

use crate::ai::prompt::{build_section_system_prompt, build_section_user_prompt};
use crate::ai::{ChatMessage, Completion, CompletionOptions, LlmClient};
use crate::config::SectionRewriteConfig;
use crate::types::{ReportError, Result, Tonality};

/// Longest accepted user feedback, in characters
pub const MAX_FEEDBACK_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct SectionRewrite<'a> {
    pub org_name: &'a str,
    pub tonality: Option<Tonality>,
    pub title: &'a str,
    pub raw_input: Option<&'a str>,
    /// Current generated report text, rewritten alongside the raw notes
    pub generated: Option<&'a str>,
    pub feedback: Option<&'a str>,
}

impl SectionRewrite<'_> {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ReportError::Validation("section title is empty".to_string()));
        }
        if let Some(feedback) = self.feedback
            && feedback.chars().count() > MAX_FEEDBACK_CHARS
        {
            return Err(ReportError::Validation(format!(
                "feedback exceeds {} characters",
                MAX_FEEDBACK_CHARS
            )));
        }
        Ok(())
    }

    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::system(build_section_system_prompt(
                self.org_name,
                self.tonality,
                self.feedback,
            )),
            ChatMessage::user(build_section_user_prompt(
                self.title,
                self.raw_input,
                self.generated,
            )),
        ]
    }
}

/// Rewrite one section. The caller decides what to persist.
#[instrument(skip(client, rewrite, config), fields(section = rewrite.title))]
pub async fn regenerate_section(
    client: &dyn LlmClient,
    rewrite: &SectionRewrite<'_>,
    config: &SectionRewriteConfig,
) -> Result<Completion> {
    rewrite.validate()?;

    let options = CompletionOptions::new(config.max_tokens, config.temperature);
    let completion = client
        .generate_completion(&rewrite.messages(), &options)
        .await?;

    info!(tokens = completion.usage.total_tokens, "Section regenerated");
    Ok(completion)
}
