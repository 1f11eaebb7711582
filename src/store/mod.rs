//! Persistence collaborators for the generation workflow
//!
//! The pipeline itself is stateless. `ReportStore` describes the reads and
//! writes a caller performs around it, and `MemoryStore` implements them over
//! concurrent maps with an optional JSON snapshot file.

mod memory;

pub use memory::{MemoryStore, Snapshot};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{
    AiUsageRecord, GenerationResult, Organization, ReferenceDocument, Report, ReportStatus,
    ReportVersion, Result, SectionContent, StyleAnalysis, Template,
};

/// Shared store handle for async contexts.
pub type SharedStore = Arc<dyn ReportStore>;

/// Version snapshot before a number is assigned
#[derive(Debug, Clone, Default)]
pub struct VersionDraft {
    pub content: String,
    pub sections_content: BTreeMap<String, SectionContent>,
    pub created_by: Option<String>,
    pub change_summary: Option<String>,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get_report(&self, id: &str) -> Result<Report>;

    async fn get_organization(&self, id: &str) -> Result<Organization>;

    async fn get_template(&self, id: &str) -> Result<Template>;

    async fn get_reference_document(&self, id: &str) -> Result<ReferenceDocument>;

    /// Most recently analyzed reference document's analysis for `org_id`;
    /// equal timestamps go to the larger document id
    async fn latest_style_analysis(&self, org_id: &str) -> Result<Option<StyleAnalysis>>;

    async fn set_report_status(&self, id: &str, status: ReportStatus) -> Result<()>;

    /// Store generated content and metadata, moving the report to `review`
    ///
    /// `sections_content` replaces the stored notes when given.
    async fn save_generation(
        &self,
        id: &str,
        sections_content: Option<BTreeMap<String, SectionContent>>,
        result: &GenerationResult,
    ) -> Result<()>;

    /// Append a snapshot numbered one past the highest existing version
    async fn append_version(&self, report_id: &str, draft: VersionDraft) -> Result<ReportVersion>;

    /// Returns the new yearly count
    async fn increment_reports_used(&self, org_id: &str) -> Result<u32>;

    async fn log_usage(&self, record: AiUsageRecord) -> Result<()>;

    async fn save_style_analysis(&self, document_id: &str, analysis: StyleAnalysis) -> Result<()>;
}
