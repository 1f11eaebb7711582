pub mod analyze_style;
pub mod config;
pub mod generate;
pub mod plan;
pub mod prompt;
pub mod section;
