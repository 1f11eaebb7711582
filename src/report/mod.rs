//! Report generation pipeline
//!
//! ```text
//! SectionContent ──input──→ SectionInput[] ──generator──→ GenerationResult
//!                                   │              │
//!                                chunker      prompt + LLM client
//! ```

pub mod chunker;
pub mod generator;
pub mod input;
pub mod section;
pub mod style;

pub use chunker::{Chunk, ChunkEntry, Chunker, SectionPart, chunk_sections};
pub use generator::{
    GenerationPhase, GenerationPlan, GenerationRequest, PlannedMethod, ProgressCallback,
    ReportGenerator, plan_generation,
};
pub use input::{collect_section_inputs, content_text, section_title};
pub use section::{MAX_FEEDBACK_CHARS, SectionRewrite, regenerate_section};
pub use style::{StyleAnalysisOutcome, analyze_style, truncate_chars};
