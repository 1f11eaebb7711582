//! Report workflow around the generation pipeline
//!
//! `ReportService` owns what the pipeline leaves to its caller: loading
//! records, the `generating` status flag and its rollback, version snapshots,
//! yearly usage counters and the AI usage audit trail.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::ai::{Completion, Credentials, LazyClient, SharedClient, TokenCounter, create_client};
use crate::config::Config;
use crate::report::{
    GenerationPlan, GenerationRequest, ProgressCallback, ReportGenerator, SectionRewrite,
    analyze_style, collect_section_inputs, plan_generation, regenerate_section, section_title,
};
use crate::store::{SharedStore, VersionDraft};
use crate::types::{
    AiAction, AiUsageRecord, GenerationResult, Organization, Report, ReportError, ReportStatus,
    Result, SectionContent, SectionInput, StyleAnalysis, Template,
};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct GenerateReportRequest {
    pub report_id: String,
    pub user_id: Option<String>,
    /// Replaces the stored section notes for this run and is saved with it
    pub sections_content: Option<BTreeMap<String, SectionContent>>,
    /// Overrides the organization's own custom instructions for this run
    pub custom_instructions: Option<String>,
}

impl GenerateReportRequest {
    pub fn new(report_id: impl Into<String>) -> Self {
        Self {
            report_id: report_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegenerateSectionRequest {
    pub report_id: String,
    pub section_id: String,
    pub user_id: Option<String>,
    pub feedback: Option<String>,
}

/// Records loaded for one report, ready to feed the generator
#[derive(Debug, Clone)]
pub struct PreparedReport {
    pub report: Report,
    pub organization: Organization,
    pub template: Template,
    pub reference_analysis: Option<StyleAnalysis>,
    pub sections_content: BTreeMap<String, SectionContent>,
    pub inputs: Vec<SectionInput>,
}

impl PreparedReport {
    pub fn request(&self) -> GenerationRequest<'_> {
        GenerationRequest {
            organization: &self.organization,
            template: &self.template,
            sections: &self.inputs,
            reference_analysis: self.reference_analysis.as_ref(),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct ReportService {
    store: SharedStore,
    config: Config,
    credentials: Credentials,
    client: LazyClient,
    counter: TokenCounter,
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("client", &self.client)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ReportService {
    /// Client is built from `credentials` on first use
    pub fn new(store: SharedStore, config: Config, credentials: Credentials) -> Self {
        Self {
            store,
            config,
            credentials,
            client: LazyClient::new(),
            counter: TokenCounter::fallback(),
        }
    }

    pub fn with_client(store: SharedStore, config: Config, client: SharedClient) -> Self {
        Self {
            client: LazyClient::with_client(client),
            ..Self::new(store, config, Credentials::default())
        }
    }

    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Resolve the LLM client, failing with a configuration error when no key is set
    pub fn client(&self) -> Result<SharedClient> {
        self.client
            .get_or_try_init(|| create_client(&self.config.llm, &self.credentials))
    }

    /// Load every record a generation of `report_id` reads
    pub async fn prepare(&self, request: &GenerateReportRequest) -> Result<PreparedReport> {
        let report = self.store.get_report(&request.report_id).await?;
        let mut organization = self.store.get_organization(&report.org_id).await?;
        let template = self.store.get_template(&report.template_id).await?;
        let reference_analysis = self.store.latest_style_analysis(&report.org_id).await?;

        if let Some(custom) = &request.custom_instructions {
            organization.style_profile.custom_instructions = Some(custom.clone());
        }

        let sections_content = request
            .sections_content
            .clone()
            .unwrap_or_else(|| report.sections_content.clone());
        let inputs = collect_section_inputs(&template, &sections_content);

        Ok(PreparedReport {
            report,
            organization,
            template,
            reference_analysis,
            sections_content,
            inputs,
        })
    }

    /// Dry run: estimate and chunk without calling the model
    pub async fn plan(&self, request: &GenerateReportRequest) -> Result<(PreparedReport, GenerationPlan)> {
        let prepared = self.prepare(request).await?;
        let plan = plan_generation(&prepared.request(), &self.config.generation, &self.counter);
        Ok((prepared, plan))
    }

    /// Generate and persist a report
    ///
    /// The report sits in `generating` only while the pipeline runs. Any
    /// failure after that, in generation or in persisting the result, puts
    /// it back to `draft` before the error is returned.
    #[instrument(skip(self, request, cancel, progress), fields(report = %request.report_id))]
    pub async fn generate_report(
        &self,
        request: &GenerateReportRequest,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<GenerationResult> {
        let client = self.client()?;
        let prepared = self.prepare(request).await?;
        if prepared.inputs.is_empty() {
            return Err(ReportError::Validation(format!(
                "Report {} has no section content to generate from",
                request.report_id
            )));
        }

        let report_id = prepared.report.id.as_str();
        self.store
            .set_report_status(report_id, ReportStatus::Generating)
            .await?;

        let mut generator = ReportGenerator::new(client, self.config.generation.clone())
            .with_counter(self.counter.clone())
            .with_cancellation(cancel);
        if let Some(progress) = progress {
            generator = generator.on_progress(progress);
        }

        let outcome = match generator.generate(&prepared.request()).await {
            Ok(result) => self.persist_generation(request, &prepared, result).await,
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            if let Err(revert) = self.store.set_report_status(report_id, ReportStatus::Draft).await {
                warn!(error = %revert, "Failed to revert report status");
            }
        }
        outcome
    }

    /// Store a finished generation: content and review status, a version
    /// snapshot, the yearly counter and the audit record
    async fn persist_generation(
        &self,
        request: &GenerateReportRequest,
        prepared: &PreparedReport,
        result: GenerationResult,
    ) -> Result<GenerationResult> {
        let report_id = prepared.report.id.as_str();
        let org_id = prepared.report.org_id.as_str();

        self.store
            .save_generation(report_id, request.sections_content.clone(), &result)
            .await?;
        let version = self
            .store
            .append_version(
                report_id,
                VersionDraft {
                    content: result.content.clone(),
                    sections_content: prepared.sections_content.clone(),
                    created_by: request.user_id.clone(),
                    change_summary: None,
                },
            )
            .await?;
        let used = self.store.increment_reports_used(org_id).await?;
        self.audit(AiUsageRecord {
            org_id: org_id.to_string(),
            report_id: Some(report_id.to_string()),
            user_id: request.user_id.clone(),
            action: AiAction::GenerateReport,
            model: result.metadata.model.clone(),
            tokens_input: result.metadata.prompt_tokens,
            tokens_output: result.metadata.completion_tokens,
            duration_ms: result.metadata.generation_time_ms,
            created_at: Utc::now(),
        })
        .await?;

        info!(
            version = version.version_number,
            reports_used = used,
            "Report saved for review"
        );
        Ok(result)
    }

    /// Rewrite one section; nothing but the audit record is stored
    #[instrument(skip(self, request), fields(report = %request.report_id, section = %request.section_id))]
    pub async fn regenerate_section(&self, request: &RegenerateSectionRequest) -> Result<Completion> {
        if request.section_id.trim().is_empty() {
            return Err(ReportError::Validation("section id is required".to_string()));
        }

        let client = self.client()?;
        let report = self.store.get_report(&request.report_id).await?;
        let organization = self.store.get_organization(&report.org_id).await?;
        let template = match self.store.get_template(&report.template_id).await {
            Ok(template) => Some(template),
            Err(ReportError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let rewrite = SectionRewrite {
            org_name: &organization.name,
            tonality: organization.style_profile.tonality,
            title: section_title(template.as_ref(), &request.section_id),
            raw_input: report
                .sections_content
                .get(&request.section_id)
                .map(|c| c.raw_input.as_str()),
            generated: report.generated_content.as_deref(),
            feedback: request.feedback.as_deref(),
        };

        let started = Instant::now();
        let completion = regenerate_section(client.as_ref(), &rewrite, &self.config.section_rewrite).await?;

        self.audit(AiUsageRecord {
            org_id: report.org_id.clone(),
            report_id: Some(report.id.clone()),
            user_id: request.user_id.clone(),
            action: AiAction::RegenerateSection,
            model: completion.model.clone(),
            tokens_input: completion.usage.prompt_tokens,
            tokens_output: completion.usage.completion_tokens,
            duration_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        })
        .await?;
        Ok(completion)
    }

    /// Analyze a reference document and store the result on it
    #[instrument(skip(self, user_id))]
    pub async fn analyze_reference(
        &self,
        document_id: &str,
        user_id: Option<&str>,
    ) -> Result<StyleAnalysis> {
        let client = self.client()?;
        let document = self.store.get_reference_document(document_id).await?;
        let text = document
            .extracted_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ReportError::Validation(format!(
                    "Reference document {} has no extracted text",
                    document_id
                ))
            })?;

        let started = Instant::now();
        let outcome = analyze_style(client.as_ref(), text, &self.config.style_analysis).await?;
        self.store
            .save_style_analysis(document_id, outcome.analysis.clone())
            .await?;

        self.audit(AiUsageRecord {
            org_id: document.org_id.clone(),
            report_id: None,
            user_id: user_id.map(str::to_string),
            action: AiAction::AnalyzeReference,
            model: outcome.model,
            tokens_input: outcome.usage.prompt_tokens,
            tokens_output: outcome.usage.completion_tokens,
            duration_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        })
        .await?;
        Ok(outcome.analysis)
    }

    async fn audit(&self, record: AiUsageRecord) -> Result<()> {
        info!(
            action = ?record.action,
            model = %record.model,
            tokens_input = record.tokens_input,
            tokens_output = record.tokens_output,
            duration_ms = record.duration_ms,
            "AI usage"
        );
        self.store.log_usage(record).await
    }
}
