//! Report domain types
//!
//! Shapes of the records the generation pipeline reads and writes:
//! organizations with their style profile, templates, report drafts,
//! reference-document analyses and the generation result itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrgType {
    #[default]
    Association,
    Foundation,
    Cooperative,
    Company,
    Municipality,
    Faith,
    Union,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Culture,
    Sports,
    Social,
    Education,
    Healthcare,
    Other,
}

/// Writing register requested by the organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tonality {
    #[serde(rename = "formal")]
    Formal,
    #[serde(rename = "semi-formal")]
    SemiFormal,
    #[serde(rename = "conversational")]
    Conversational,
}

impl fmt::Display for Tonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tonality::Formal => write!(f, "formal"),
            Tonality::SemiFormal => write!(f, "semi-formal"),
            Tonality::Conversational => write!(f, "conversational"),
        }
    }
}

impl std::str::FromStr for Tonality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" => Ok(Tonality::Formal),
            "semi-formal" | "semi_formal" | "semiformal" => Ok(Tonality::SemiFormal),
            "conversational" => Ok(Tonality::Conversational),
            _ => Err(format!(
                "Unknown tonality: {}. Valid values: formal, semi-formal, conversational",
                s
            )),
        }
    }
}

/// Unknown or malformed tonality values read as "unspecified"
fn lenient_tonality<'de, D>(deserializer: D) -> Result<Option<Tonality>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Draft,
    Generating,
    Review,
    Final,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Draft => write!(f, "draft"),
            ReportStatus::Generating => write!(f, "generating"),
            ReportStatus::Review => write!(f, "review"),
            ReportStatus::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiAction {
    GenerateReport,
    AnalyzeReference,
    RegenerateSection,
}

/// How the generator reached its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    SinglePass,
    Chunked,
    ChunkedWithCoherencePass,
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMethod::SinglePass => write!(f, "single_pass"),
            ProcessingMethod::Chunked => write!(f, "chunked"),
            ProcessingMethod::ChunkedWithCoherencePass => write!(f, "chunked_with_coherence_pass"),
        }
    }
}

// =============================================================================
// Organization & Style
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleProfile {
    #[serde(deserialize_with = "lenient_tonality")]
    pub tonality: Option<Tonality>,
    pub formality_score: Option<f32>,
    pub avg_sentence_length: Option<f32>,
    pub vocabulary_level: Option<String>,
    pub active_voice_preference: Option<f32>,
    pub custom_instructions: Option<String>,
    pub extracted_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub org_type: OrgType,
    #[serde(default)]
    pub sector: Option<Sector>,
    #[serde(default)]
    pub style_profile: StyleProfile,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    #[serde(default)]
    pub reports_used_this_year: u32,
}

/// Style profile derived from a reference document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleAnalysis {
    #[serde(deserialize_with = "lenient_tonality")]
    pub tonality: Option<Tonality>,
    pub formality_score: Option<f32>,
    pub avg_sentence_length: Option<f32>,
    pub vocabulary_level: Option<String>,
    pub active_voice_ratio: Option<f32>,
    pub common_phrases: Vec<String>,
    pub section_transition_style: Option<String>,
    pub number_presentation: Option<String>,
    pub person_reference: Option<String>,
    pub tense_preference: Option<String>,
    pub paragraph_style: Option<String>,
    pub use_of_subheadings: Option<bool>,
    pub analysis_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub id: String,
    pub org_id: String,
    pub file_name: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub style_analysis: Option<StyleAnalysis>,
    #[serde(default)]
    pub is_analyzed: bool,
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Templates & Reports
// =============================================================================

fn default_level() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    pub id: String,
    pub title: String,
    /// Outline depth, 1..=3
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub ai_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: Vec<TemplateSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionContent {
    pub raw_input: String,
    pub is_locked: bool,
    pub last_edited: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub org_id: String,
    pub template_id: String,
    #[serde(default)]
    pub title: String,
    /// Keyed by template section id
    #[serde(default)]
    pub sections_content: BTreeMap<String, SectionContent>,
    #[serde(default)]
    pub generated_content: Option<String>,
    #[serde(default)]
    pub generation_metadata: Option<GenerationMetadata>,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportVersion {
    pub id: Uuid,
    pub report_id: String,
    pub version_number: u32,
    pub content: String,
    #[serde(default)]
    pub sections_content: BTreeMap<String, SectionContent>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub change_summary: Option<String>,
}

/// Audit record for one AI-backed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiUsageRecord {
    pub org_id: String,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub action: AiAction,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Generation I/O
// =============================================================================

/// One organization-authored block of notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInput {
    pub section_id: String,
    pub title: String,
    pub raw_text: String,
}

impl SectionInput {
    pub fn new(
        section_id: impl Into<String>,
        title: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            section_id: section_id.into(),
            title: title.into(),
            raw_text: raw_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub chunks: usize,
    pub total_tokens: u64,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    pub processing_method: ProcessingMethod,
    pub generation_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub metadata: GenerationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonality_serde_names() {
        assert_eq!(
            serde_json::to_string(&Tonality::SemiFormal).unwrap(),
            "\"semi-formal\""
        );
        let t: Tonality = serde_json::from_str("\"conversational\"").unwrap();
        assert_eq!(t, Tonality::Conversational);
    }

    #[test]
    fn test_unknown_tonality_reads_as_unspecified() {
        let profile: StyleProfile =
            serde_json::from_str(r#"{"tonality": "poetic", "custom_instructions": "Kort."}"#)
                .unwrap();
        assert_eq!(profile.tonality, None);
        assert_eq!(profile.custom_instructions.as_deref(), Some("Kort."));

        let profile: StyleProfile = serde_json::from_str(r#"{"tonality": 3}"#).unwrap();
        assert_eq!(profile.tonality, None);

        let profile: StyleProfile = serde_json::from_str(r#"{"tonality": "formal"}"#).unwrap();
        assert_eq!(profile.tonality, Some(Tonality::Formal));
    }

    #[test]
    fn test_style_analysis_tolerates_partial_json() {
        let analysis: StyleAnalysis = serde_json::from_str(
            r#"{"common_phrases": ["under året"], "person_reference": "vi", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(analysis.common_phrases, vec!["under året"]);
        assert_eq!(analysis.person_reference.as_deref(), Some("vi"));
        assert!(analysis.analysis_summary.is_none());
    }

    #[test]
    fn test_processing_method_names() {
        assert_eq!(ProcessingMethod::SinglePass.to_string(), "single_pass");
        assert_eq!(
            serde_json::to_string(&ProcessingMethod::ChunkedWithCoherencePass).unwrap(),
            "\"chunked_with_coherence_pass\""
        );
    }

    #[test]
    fn test_template_section_defaults() {
        let section: TemplateSection =
            serde_json::from_str(r#"{"id": "s1", "title": "Sammanfattning"}"#).unwrap();
        assert_eq!(section.level, 1);
        assert_eq!(section.order, 0);
        assert!(section.ai_instructions.is_none());
    }
}
