//! In-process client doubles for pipeline tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::{ChatMessage, Completion, CompletionOptions, LlmClient, TokenUsage};
use crate::types::{ErrorCategory, LlmError, ReportError, Result};

pub(crate) enum Step {
    Reply(String, TokenUsage),
    Fail(ErrorCategory),
    /// Sleep before replying, to exercise cancellation
    Slow(Duration, String),
}

/// Client that plays back a fixed script and records every request
pub(crate) struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<String>,
    usage: TokenUsage,
    calls: AtomicU32,
    requests: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
}

impl ScriptedClient {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            usage: TokenUsage::new(100, 50, None),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text` with usage 100/50
    pub(crate) fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<(Vec<ChatMessage>, CompletionOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), options.clone()));

        let step = self.steps.lock().unwrap().pop_front();
        let (text, usage) = match step {
            Some(Step::Reply(text, usage)) => (text, usage),
            Some(Step::Fail(category)) => {
                return Err(ReportError::Llm(LlmError::with_provider(
                    category,
                    "scripted failure",
                    "scripted",
                )));
            }
            Some(Step::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                (text, self.usage)
            }
            None => match &self.fallback {
                Some(text) => (text.clone(), self.usage),
                None => {
                    return Err(ReportError::Llm(LlmError::new(
                        ErrorCategory::Unknown,
                        "script exhausted",
                    )));
                }
            },
        };

        Ok(Completion {
            content: text.trim().to_string(),
            usage,
            model: "scripted-model".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}
