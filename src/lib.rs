//! reportforge - LLM-Backed Activity Report Generation
//!
//! Turns an organization's per-section notes into a polished activity
//! report, written in the organization's own voice.
//!
//! ## Core Features
//!
//! - **Token Budgeting**: estimates prompt size before any model call
//! - **Chunked Generation**: oversized input is split on section and paragraph
//!   boundaries, then merged back in an optional coherence pass
//! - **Provider Abstraction**: OpenAI and Anthropic behind one async trait,
//!   with shared retry and cancellation
//! - **Style Analysis**: reference documents yield a style profile that
//!   steers later generations
//!
//! ## Quick Start
//!
//! ```ignore
//! use reportforge::{ConfigLoader, GenerateReportRequest, MemoryStore, ReportService};
//! use reportforge::ai::Credentials;
//!
//! let config = ConfigLoader::load()?;
//! let store = Arc::new(MemoryStore::load(&config.store.path)?);
//! let service = ReportService::new(store, config, Credentials::from_env());
//! let result = service
//!     .generate_report(&GenerateReportRequest::new("report-1"), CancellationToken::new(), None)
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: token counting, provider clients, prompt assembly
//! - [`report`]: chunking, the generation state machine, section rewrites
//! - [`store`]: persistence trait and the JSON-backed in-memory store
//! - [`service`]: workflows tying store, config and client together
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod report;
pub mod service;
pub mod store;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, GenerationConfig, LlmConfig, ProviderKind};

// Error Types
pub use types::error::{ErrorCategory, LlmError, ReportError, Result};

// Storage
pub use store::{MemoryStore, ReportStore, SharedStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use report::{
    Chunker, GenerationPhase, GenerationPlan, GenerationRequest, ProgressCallback,
    ReportGenerator,
};
pub use service::{GenerateReportRequest, RegenerateSectionRequest, ReportService};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    ChatMessage, Completion, CompletionOptions, LlmClient, SharedClient, TokenCounter,
    TokenUsage, create_client,
};
