//! Reference-document style analysis

use tracing::{debug, info, instrument};

use crate::ai::json_repair::extract_object;
use crate::ai::prompt::{STYLE_ANALYSIS_PROMPT, build_style_user_prompt};
use crate::ai::{ChatMessage, CompletionOptions, LlmClient, TokenUsage};
use crate::config::StyleAnalysisConfig;
use crate::types::{ReportError, Result, StyleAnalysis};

/// Parsed analysis plus what the call cost
#[derive(Debug, Clone, PartialEq)]
pub struct StyleAnalysisOutcome {
    pub analysis: StyleAnalysis,
    pub usage: TokenUsage,
    pub model: String,
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ask the model for a JSON style profile of a reference document
#[instrument(skip(client, text, config), fields(chars = text.chars().count()))]
pub async fn analyze_style(
    client: &dyn LlmClient,
    text: &str,
    config: &StyleAnalysisConfig,
) -> Result<StyleAnalysisOutcome> {
    if text.trim().is_empty() {
        return Err(ReportError::StyleAnalysis(
            "reference document has no text".to_string(),
        ));
    }

    let excerpt = truncate_chars(text, config.max_chars);
    if excerpt.len() < text.len() {
        debug!(max_chars = config.max_chars, "Reference text truncated");
    }

    let messages = [
        ChatMessage::system(STYLE_ANALYSIS_PROMPT),
        ChatMessage::user(build_style_user_prompt(excerpt)),
    ];
    let options = CompletionOptions::new(config.max_tokens, config.temperature);
    let completion = client.generate_completion(&messages, &options).await?;

    let value = extract_object(&completion.content)
        .map_err(|e| ReportError::StyleAnalysis(e.to_string()))?;
    let analysis: StyleAnalysis = serde_json::from_value(value)
        .map_err(|e| ReportError::StyleAnalysis(format!("unexpected style profile shape: {}", e)))?;

    info!(
        tonality = ?analysis.tonality,
        phrases = analysis.common_phrases.len(),
        "Style analysis complete"
    );

    Ok(StyleAnalysisOutcome {
        analysis,
        usage: completion.usage,
        model: completion.model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::{ScriptedClient, Step};
    use crate::types::{ErrorCategory, Tonality};

    const REPLY: &str = r#"Här är analysen:
```json
{
  "tonality": "semi-formal",
  "formality_score": 0.6,
  "avg_sentence_length": 14,
  "common_phrases": ["under året", "vi är stolta över"],
  "person_reference": "vi",
  "use_of_subheadings": true,
  "analysis_summary": "Varm men saklig ton."
}
```"#;

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("åäöx", 3), "åäö");
        assert_eq!(truncate_chars("kort", 10), "kort");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_analysis_parsed_from_wrapped_reply() {
        let client = ScriptedClient::always(REPLY);
        let outcome = analyze_style(&client, "Verksamhetsberättelse 2024.", &StyleAnalysisConfig::default())
            .await
            .unwrap();

        let analysis = outcome.analysis;
        assert_eq!(analysis.tonality, Some(Tonality::SemiFormal));
        assert_eq!(analysis.common_phrases, vec!["under året", "vi är stolta över"]);
        assert_eq!(analysis.person_reference.as_deref(), Some("vi"));
        assert_eq!(analysis.use_of_subheadings, Some(true));
        assert_eq!(outcome.usage.total_tokens, 150);

        let (messages, options) = &client.requests()[0];
        assert!(messages[0].content.starts_with("Du är expert på att analysera skrivstil"));
        assert_eq!(messages[1].content, "TEXT ATT ANALYSERA:\n\nVerksamhetsberättelse 2024.");
        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.max_tokens, Some(4000));
    }

    #[tokio::test]
    async fn test_long_text_truncated_before_sending() {
        let client = ScriptedClient::always(r#"{"tonality": "formal"}"#);
        let config = StyleAnalysisConfig {
            max_chars: 5,
            ..Default::default()
        };
        analyze_style(&client, "ÅÅÅÅÅÅÅÅÅÅ", &config).await.unwrap();

        let (messages, _) = &client.requests()[0];
        assert!(messages[1].content.ends_with("\n\nÅÅÅÅÅ"));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_style_error() {
        let client = ScriptedClient::always("Tyvärr, det kan jag inte.");
        let err = analyze_style(&client, "Text", &StyleAnalysisConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::StyleAnalysis(_)));
    }

    #[tokio::test]
    async fn test_unknown_tonality_tolerated() {
        let client = ScriptedClient::always(r#"{"tonality": "poetic", "formality_score": 0.2}"#);
        let outcome = analyze_style(&client, "Text", &StyleAnalysisConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.analysis.tonality, None);
        assert_eq!(outcome.analysis.formality_score, Some(0.2));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let client = ScriptedClient::new(vec![Step::Fail(ErrorCategory::Auth)]);
        let err = analyze_style(&client, "Text", &StyleAnalysisConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Auth));
    }

    #[tokio::test]
    async fn test_blank_text_rejected_without_call() {
        let client = ScriptedClient::always("{}");
        let err = analyze_style(&client, "  \n", &StyleAnalysisConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::StyleAnalysis(_)));
        assert_eq!(client.calls(), 0);
    }
}
