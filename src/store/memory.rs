use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ReportStore, VersionDraft};
use crate::types::{
    AiUsageRecord, GenerationResult, Organization, ReferenceDocument, Report, ReportError,
    ReportStatus, ReportVersion, Result, SectionContent, StyleAnalysis, Template,
};

/// On-disk shape of a `MemoryStore`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub organizations: Vec<Organization>,
    pub templates: Vec<Template>,
    pub reports: Vec<Report>,
    pub reference_documents: Vec<ReferenceDocument>,
    pub versions: Vec<ReportVersion>,
    pub usage: Vec<AiUsageRecord>,
}

/// Concurrent in-memory store
///
/// Each collection is its own `DashMap`; no operation holds more than one
/// entry lock at a time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: DashMap<String, Organization>,
    templates: DashMap<String, Template>,
    reports: DashMap<String, Report>,
    references: DashMap<String, ReferenceDocument>,
    /// Keyed by report id, ascending version number
    versions: DashMap<String, Vec<ReportVersion>>,
    /// Keyed by org id, append order
    usage: DashMap<String, Vec<AiUsageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for org in snapshot.organizations {
            store.insert_organization(org);
        }
        for template in snapshot.templates {
            store.insert_template(template);
        }
        for report in snapshot.reports {
            store.insert_report(report);
        }
        for doc in snapshot.reference_documents {
            store.insert_reference_document(doc);
        }
        for version in snapshot.versions {
            store
                .versions
                .entry(version.report_id.clone())
                .or_default()
                .push(version);
        }
        for mut versions in store.versions.iter_mut() {
            versions.sort_by_key(|v| v.version_number);
        }
        for record in snapshot.usage {
            store
                .usage
                .entry(record.org_id.clone())
                .or_default()
                .push(record);
        }
        store
    }

    /// Contents sorted by id, so repeated saves produce identical files
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            organizations: self.organizations.iter().map(|e| e.value().clone()).collect(),
            templates: self.templates.iter().map(|e| e.value().clone()).collect(),
            reports: self.reports.iter().map(|e| e.value().clone()).collect(),
            reference_documents: self.references.iter().map(|e| e.value().clone()).collect(),
            versions: self.versions.iter().flat_map(|e| e.value().clone()).collect(),
            usage: Vec::new(),
        };
        snapshot.organizations.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.templates.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.reports.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.reference_documents.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
            .versions
            .sort_by(|a, b| (&a.report_id, a.version_number).cmp(&(&b.report_id, b.version_number)));

        let mut org_ids: Vec<String> = self.usage.iter().map(|e| e.key().clone()).collect();
        org_ids.sort();
        for org_id in org_ids {
            snapshot.usage.extend(self.list_usage(&org_id));
        }
        snapshot
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Storage(format!("Failed to read store {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            ReportError::Storage(format!("Invalid store file {}: {}", path.display(), e))
        })?;
        debug!(
            path = %path.display(),
            reports = snapshot.reports.len(),
            "Loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Missing file means an empty store
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }

    pub fn insert_organization(&self, org: Organization) {
        self.organizations.insert(org.id.clone(), org);
    }

    pub fn insert_template(&self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn insert_report(&self, report: Report) {
        self.reports.insert(report.id.clone(), report);
    }

    pub fn insert_reference_document(&self, doc: ReferenceDocument) {
        self.references.insert(doc.id.clone(), doc);
    }

    pub fn list_versions(&self, report_id: &str) -> Vec<ReportVersion> {
        self.versions
            .get(report_id)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    pub fn list_usage(&self, org_id: &str) -> Vec<AiUsageRecord> {
        self.usage
            .get(org_id)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    fn update_report<F>(&self, id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut Report),
    {
        let mut report = self
            .reports
            .get_mut(id)
            .ok_or_else(|| ReportError::not_found("report", id))?;
        update(report.value_mut());
        report.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get_report(&self, id: &str) -> Result<Report> {
        self.reports
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ReportError::not_found("report", id))
    }

    async fn get_organization(&self, id: &str) -> Result<Organization> {
        self.organizations
            .get(id)
            .map(|o| o.value().clone())
            .ok_or_else(|| ReportError::not_found("organization", id))
    }

    async fn get_template(&self, id: &str) -> Result<Template> {
        self.templates
            .get(id)
            .map(|t| t.value().clone())
            .ok_or_else(|| ReportError::not_found("template", id))
    }

    async fn get_reference_document(&self, id: &str) -> Result<ReferenceDocument> {
        self.references
            .get(id)
            .map(|d| d.value().clone())
            .ok_or_else(|| ReportError::not_found("reference document", id))
    }

    async fn latest_style_analysis(&self, org_id: &str) -> Result<Option<StyleAnalysis>> {
        Ok(self
            .references
            .iter()
            .filter(|d| d.org_id == org_id && d.is_analyzed && d.style_analysis.is_some())
            // Equal timestamps fall back to the larger document id
            .max_by(|a, b| {
                a.analyzed_at
                    .cmp(&b.analyzed_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .and_then(|d| d.style_analysis.clone()))
    }

    async fn set_report_status(&self, id: &str, status: ReportStatus) -> Result<()> {
        self.update_report(id, |r| r.status = status)
    }

    async fn save_generation(
        &self,
        id: &str,
        sections_content: Option<BTreeMap<String, SectionContent>>,
        result: &GenerationResult,
    ) -> Result<()> {
        self.update_report(id, |r| {
            if let Some(sections) = sections_content {
                r.sections_content = sections;
            }
            r.generated_content = Some(result.content.clone());
            r.generation_metadata = Some(result.metadata.clone());
            r.status = ReportStatus::Review;
        })
    }

    async fn append_version(&self, report_id: &str, draft: VersionDraft) -> Result<ReportVersion> {
        if !self.reports.contains_key(report_id) {
            return Err(ReportError::not_found("report", report_id));
        }

        let mut versions = self.versions.entry(report_id.to_string()).or_default();
        let version_number = versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        let version = ReportVersion {
            id: Uuid::new_v4(),
            report_id: report_id.to_string(),
            version_number,
            content: draft.content,
            sections_content: draft.sections_content,
            created_at: Utc::now(),
            created_by: draft.created_by,
            change_summary: draft.change_summary,
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn increment_reports_used(&self, org_id: &str) -> Result<u32> {
        let mut org = self
            .organizations
            .get_mut(org_id)
            .ok_or_else(|| ReportError::not_found("organization", org_id))?;
        org.reports_used_this_year += 1;
        Ok(org.reports_used_this_year)
    }

    async fn log_usage(&self, record: AiUsageRecord) -> Result<()> {
        self.usage
            .entry(record.org_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn save_style_analysis(&self, document_id: &str, analysis: StyleAnalysis) -> Result<()> {
        let mut doc = self
            .references
            .get_mut(document_id)
            .ok_or_else(|| ReportError::not_found("reference document", document_id))?;
        doc.style_analysis = Some(analysis);
        doc.is_analyzed = true;
        doc.analyzed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::tests::{organization, template};
    use crate::types::{AiAction, GenerationMetadata, OrgType, ProcessingMethod, Tonality};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn report() -> Report {
        Report {
            id: "rep-1".to_string(),
            org_id: "org-1".to_string(),
            template_id: "tpl-1".to_string(),
            title: "Verksamhetsberättelse 2024".to_string(),
            sections_content: BTreeMap::new(),
            generated_content: None,
            generation_metadata: None,
            status: ReportStatus::Draft,
            updated_at: None,
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_organization(organization("Testföreningen", OrgType::Association));
        store.insert_template(template());
        store.insert_report(report());
        store
    }

    fn reference(id: &str, analyzed_at: Option<chrono::DateTime<Utc>>, tonality: Tonality) -> ReferenceDocument {
        ReferenceDocument {
            id: id.to_string(),
            org_id: "org-1".to_string(),
            file_name: format!("{id}.pdf"),
            extracted_text: Some("Text".to_string()),
            style_analysis: Some(StyleAnalysis {
                tonality: Some(tonality),
                ..Default::default()
            }),
            is_analyzed: analyzed_at.is_some(),
            analyzed_at,
        }
    }

    fn result() -> GenerationResult {
        GenerationResult {
            content: "Rapport".to_string(),
            metadata: GenerationMetadata {
                model: "m".to_string(),
                chunks: 1,
                total_tokens: 150,
                prompt_tokens: 100,
                completion_tokens: 50,
                processing_method: ProcessingMethod::SinglePass,
                generation_time_ms: 12,
            },
        }
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = MemoryStore::new();
        let err = store.get_report("nope").await.unwrap_err();
        assert!(matches!(err, ReportError::NotFound { kind: "report", .. }));
        assert!(store.increment_reports_used("nope").await.is_err());
        assert!(store.set_report_status("nope", ReportStatus::Review).await.is_err());
    }

    #[tokio::test]
    async fn test_save_generation_moves_to_review() {
        let store = seeded();
        let mut notes = BTreeMap::new();
        notes.insert("1".to_string(), SectionContent {
            raw_input: "Nya anteckningar".to_string(),
            ..Default::default()
        });

        store.save_generation("rep-1", Some(notes), &result()).await.unwrap();

        let saved = store.get_report("rep-1").await.unwrap();
        assert_eq!(saved.status, ReportStatus::Review);
        assert_eq!(saved.generated_content.as_deref(), Some("Rapport"));
        assert_eq!(saved.generation_metadata.unwrap().total_tokens, 150);
        assert_eq!(saved.sections_content["1"].raw_input, "Nya anteckningar");
        assert!(saved.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_versions_number_sequentially() {
        let store = seeded();
        for i in 1..=3 {
            let version = store
                .append_version("rep-1", VersionDraft {
                    content: format!("v{i}"),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(version.version_number, i);
        }
        assert!(store.append_version("nope", VersionDraft::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_version_appends_unique() {
        let store = Arc::new(seeded());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_version("rep-1", VersionDraft::default())
                        .await
                        .unwrap()
                        .version_number
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();
        assert_eq!(numbers, (1..=16).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_latest_style_analysis_by_time() {
        let store = seeded();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        store.insert_reference_document(reference("old", Some(base), Tonality::Formal));
        store.insert_reference_document(reference(
            "new",
            Some(base + Duration::days(2)),
            Tonality::Conversational,
        ));
        store.insert_reference_document(reference("pending", None, Tonality::SemiFormal));

        let latest = store.latest_style_analysis("org-1").await.unwrap().unwrap();
        assert_eq!(latest.tonality, Some(Tonality::Conversational));
        assert!(store.latest_style_analysis("org-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_style_analysis_tie_breaks_on_id() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for order in [["doc-a", "doc-b"], ["doc-b", "doc-a"]] {
            let store = seeded();
            for id in order {
                let tonality = if id == "doc-b" {
                    Tonality::Conversational
                } else {
                    Tonality::Formal
                };
                store.insert_reference_document(reference(id, Some(at), tonality));
            }
            let latest = store.latest_style_analysis("org-1").await.unwrap().unwrap();
            assert_eq!(latest.tonality, Some(Tonality::Conversational));
        }
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/store.json");

        let store = seeded();
        store.increment_reports_used("org-1").await.unwrap();
        store
            .append_version("rep-1", VersionDraft {
                content: "v1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .log_usage(AiUsageRecord {
                org_id: "org-1".to_string(),
                report_id: Some("rep-1".to_string()),
                user_id: None,
                action: AiAction::GenerateReport,
                model: "m".to_string(),
                tokens_input: 100,
                tokens_output: 50,
                duration_ms: 10,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(
            loaded.get_organization("org-1").await.unwrap().reports_used_this_year,
            1
        );
        assert_eq!(loaded.list_versions("rep-1").len(), 1);
        assert_eq!(loaded.list_usage("org-1").len(), 1);
        assert_eq!(loaded.get_template("tpl-1").await.unwrap().sections.len(), 2);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        assert!(matches!(MemoryStore::load(&path), Err(ReportError::Storage(_))));
        assert!(MemoryStore::load_or_default(&path).unwrap().snapshot().reports.is_empty());

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(MemoryStore::load(&path), Err(ReportError::Storage(_))));
    }
}
