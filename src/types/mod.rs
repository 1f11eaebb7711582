pub mod error;
pub mod report;

pub use error::{ErrorCategory, LlmError, ReportError, Result};
pub use report::*;
