//! Report Generator
//!
//! Drives one report generation from section inputs to a finished document.
//!
//! ```text
//! Idle → Estimating ─┬─ SinglePass ─────────────────────────────┬─→ Done
//!                    └─ Chunking → ChunkLoop ─→ (CoherencePass) ┘
//!                                      any fatal error ─→ Failed
//! ```
//!
//! Only the single-pass call and the chunk calls are fatal. A failed
//! coherence pass keeps the joined chunk output.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::chunker::{Chunk, Chunker};
use super::input::content_text;
use crate::ai::prompt::{
    ChunkInfo, SystemPromptInput, build_coherence_prompt, build_system_prompt, build_user_prompt,
};
use crate::ai::{
    ChatMessage, Completion, CompletionOptions, SharedClient, TokenCounter, TokenUsage,
    with_cancellation,
};
use crate::config::GenerationConfig;
use crate::constants::generation::CHUNK_SEPARATOR;
use crate::types::{
    GenerationMetadata, GenerationResult, Organization, ProcessingMethod, ReportError, Result,
    SectionInput, StyleAnalysis, Template,
};

// =============================================================================
// Phases
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Estimating,
    SinglePass,
    Chunking,
    /// 1-based position of the chunk being generated
    ChunkLoop {
        current: usize,
        total: usize,
    },
    CoherencePass,
    Done,
    Failed,
}

impl GenerationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Estimating => write!(f, "estimating"),
            Self::SinglePass => write!(f, "single pass"),
            Self::Chunking => write!(f, "chunking"),
            Self::ChunkLoop { current, total } => write!(f, "chunk {}/{}", current, total),
            Self::CoherencePass => write!(f, "coherence pass"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(GenerationPhase) + Send + Sync>;

// =============================================================================
// Request & Plan
// =============================================================================

/// Everything one generation reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub organization: &'a Organization,
    pub template: &'a Template,
    pub sections: &'a [SectionInput],
    pub reference_analysis: Option<&'a StyleAnalysis>,
}

impl GenerationRequest<'_> {
    pub fn system_prompt(&self) -> String {
        build_system_prompt(&SystemPromptInput {
            organization: self.organization,
            template: self.template,
            style_profile: &self.organization.style_profile,
            reference_analysis: self.reference_analysis,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedMethod {
    SinglePass,
    Chunked(Vec<Chunk>),
}

/// Estimation result, computed without any LLM call
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub system_prompt: String,
    pub content: String,
    pub system_tokens: usize,
    pub content_tokens: usize,
    pub method: PlannedMethod,
}

impl GenerationPlan {
    pub fn estimated_tokens(&self) -> usize {
        self.system_tokens + self.content_tokens
    }

    pub fn chunk_count(&self) -> usize {
        match &self.method {
            PlannedMethod::SinglePass => 1,
            PlannedMethod::Chunked(chunks) => chunks.len(),
        }
    }
}

// =============================================================================
// Generator
// =============================================================================

pub struct ReportGenerator {
    client: SharedClient,
    config: GenerationConfig,
    counter: TokenCounter,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportGenerator")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl ReportGenerator {
    pub fn new(client: SharedClient, config: GenerationConfig) -> Self {
        Self {
            client,
            config,
            counter: TokenCounter::fallback(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Stop between chunks and abort the in-flight call when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Decide between single pass and chunking
    pub fn plan(&self, request: &GenerationRequest<'_>) -> GenerationPlan {
        plan_generation(request, &self.config, &self.counter)
    }

    #[instrument(
        skip(self, request),
        fields(org = %request.organization.id, sections = request.sections.len())
    )]
    pub async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerationResult> {
        let start = Instant::now();
        self.report(GenerationPhase::Idle);

        match self.run(request, start).await {
            Ok(result) => {
                self.report(GenerationPhase::Done);
                info!(
                    method = %result.metadata.processing_method,
                    chunks = result.metadata.chunks,
                    tokens = result.metadata.total_tokens,
                    elapsed_ms = result.metadata.generation_time_ms,
                    "Report generated"
                );
                Ok(result)
            }
            Err(e) => {
                self.report(GenerationPhase::Failed);
                warn!(error = %e, "Report generation failed");
                Err(e)
            }
        }
    }

    async fn run(&self, request: &GenerationRequest<'_>, start: Instant) -> Result<GenerationResult> {
        self.report(GenerationPhase::Estimating);
        let plan = self.plan(request);
        debug!(
            system_tokens = plan.system_tokens,
            content_tokens = plan.content_tokens,
            limit = self.config.safe_input_limit,
            "Estimated input"
        );

        let mut usage = TokenUsage::default();
        let mut model: Option<String> = None;

        let (content, chunks, method) = match &plan.method {
            PlannedMethod::SinglePass => {
                self.report(GenerationPhase::SinglePass);
                let completion = self
                    .call(&plan.system_prompt, build_user_prompt(&plan.content, None), self.main_options())
                    .await
                    .map_err(|e| phase_error("single_pass", e))?;
                record(&mut usage, &mut model, &completion);
                (completion.content, 1, ProcessingMethod::SinglePass)
            }
            PlannedMethod::Chunked(chunks) => {
                self.report(GenerationPhase::Chunking);
                let joined = self
                    .run_chunks(&plan.system_prompt, chunks, &mut usage, &mut model)
                    .await?;

                let total = chunks.len();
                if self.wants_coherence_pass(total) {
                    match self.coherence_pass(&plan.system_prompt, &joined).await {
                        Ok(completion) => {
                            record(&mut usage, &mut model, &completion);
                            (completion.content, total, ProcessingMethod::ChunkedWithCoherencePass)
                        }
                        Err(ReportError::Cancelled) => return Err(ReportError::Cancelled),
                        Err(e) => {
                            warn!(error = %e, "Coherence pass failed, keeping joined output");
                            (joined, total, ProcessingMethod::Chunked)
                        }
                    }
                } else {
                    (joined, total, ProcessingMethod::Chunked)
                }
            }
        };

        Ok(GenerationResult {
            content,
            metadata: GenerationMetadata {
                model: model.unwrap_or_else(|| self.client.model().to_string()),
                chunks,
                total_tokens: usage.total_tokens,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                processing_method: method,
                generation_time_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Chunk calls strictly in order, outputs joined with a visible separator
    async fn run_chunks(
        &self,
        system_prompt: &str,
        chunks: &[Chunk],
        usage: &mut TokenUsage,
        model: &mut Option<String>,
    ) -> Result<String> {
        let total = chunks.len();
        let delay = Duration::from_millis(self.config.chunk_delay_ms);
        let mut outputs = Vec::with_capacity(total);

        for (i, chunk) in chunks.iter().enumerate() {
            let current = i + 1;
            if i > 0 && !delay.is_zero() {
                with_cancellation(&self.cancel, async {
                    tokio::time::sleep(delay).await;
                    Ok::<_, ReportError>(())
                })
                .await?;
            }

            self.report(GenerationPhase::ChunkLoop { current, total });
            info!(chunk = current, total, "Generating chunk");

            let prompt = build_user_prompt(&chunk.text(), Some(ChunkInfo { current, total }));
            let completion = self
                .call(system_prompt, prompt, self.main_options())
                .await
                .map_err(|e| phase_error(&format!("chunk {}/{}", current, total), e))?;

            debug!(chunk = current, tokens = completion.usage.total_tokens, "Chunk done");
            record(usage, model, &completion);
            outputs.push(completion.content);
        }

        Ok(outputs.join(CHUNK_SEPARATOR))
    }

    fn wants_coherence_pass(&self, chunks: usize) -> bool {
        self.config.coherence.applies_to(chunks)
    }

    async fn coherence_pass(&self, system_prompt: &str, joined: &str) -> Result<Completion> {
        self.report(GenerationPhase::CoherencePass);
        info!("Running coherence pass");

        let coherence = &self.config.coherence;
        let completion = self
            .call(
                system_prompt,
                build_coherence_prompt(joined),
                CompletionOptions::new(coherence.max_tokens, coherence.temperature),
            )
            .await?;

        if completion.content.is_empty() {
            return Err(ReportError::generation(
                "coherence_pass",
                "model returned empty content",
            ));
        }
        Ok(completion)
    }

    async fn call(
        &self,
        system_prompt: &str,
        user_prompt: String,
        options: CompletionOptions,
    ) -> Result<Completion> {
        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        with_cancellation(
            &self.cancel,
            self.client.generate_completion(&messages, &options),
        )
        .await
    }

    fn main_options(&self) -> CompletionOptions {
        CompletionOptions::new(self.config.max_tokens, self.config.temperature)
    }

    fn report(&self, phase: GenerationPhase) {
        if let Some(callback) = &self.progress {
            callback(phase);
        }
    }
}

/// Estimate a request and pick single pass or a chunk layout
pub fn plan_generation(
    request: &GenerationRequest<'_>,
    config: &GenerationConfig,
    counter: &TokenCounter,
) -> GenerationPlan {
    let system_prompt = request.system_prompt();
    let content = content_text(request.sections);
    let system_tokens = counter.count(&system_prompt);
    let content_tokens = counter.count(&content);

    let method = if system_tokens + content_tokens <= config.safe_input_limit {
        PlannedMethod::SinglePass
    } else {
        let chunker = Chunker::new(counter.clone(), config.max_tokens_per_chunk);
        PlannedMethod::Chunked(chunker.chunk(request.sections, system_tokens))
    };

    GenerationPlan {
        system_prompt,
        content,
        system_tokens,
        content_tokens,
        method,
    }
}

fn record(usage: &mut TokenUsage, model: &mut Option<String>, completion: &Completion) {
    *usage += completion.usage;
    if model.is_none() && !completion.model.is_empty() {
        *model = Some(completion.model.clone());
    }
}

/// Cancellation passes through untouched; anything else names the phase it hit
fn phase_error(phase: &str, err: ReportError) -> ReportError {
    match err {
        ReportError::Cancelled => ReportError::Cancelled,
        other => ReportError::generation(phase, other.to_string()),
    }
}
