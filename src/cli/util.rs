//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, the local
//! report store and the service built on top of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::Credentials;
use crate::config::{Config, ConfigLoader};
use crate::service::ReportService;
use crate::store::MemoryStore;
use crate::types::{ReportError, Result, SectionContent};

/// Global flags every command shares
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Config file used instead of the global/project chain
    pub config: Option<PathBuf>,
    /// Store file overriding `store.path`
    pub store: Option<PathBuf>,
    pub quiet: bool,
}

/// Command execution context
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    pub store_path: PathBuf,
    pub store: Arc<MemoryStore>,
}

impl CommandContext {
    /// Load config and open the store, which must already exist
    pub fn load(options: &GlobalOptions) -> Result<Self> {
        let config = load_config(options)?;
        let store_path = options
            .store
            .clone()
            .unwrap_or_else(|| config.store.path.clone());

        if !store_path.exists() {
            return Err(ReportError::Storage(format!(
                "No report store at {}. Pass --store or set store.path",
                store_path.display()
            )));
        }
        let store = Arc::new(MemoryStore::load(&store_path)?);

        Ok(Self {
            config,
            store_path,
            store,
        })
    }

    /// Service with credentials from the environment
    pub fn service(&self) -> ReportService {
        ReportService::new(self.store.clone(), self.config.clone(), Credentials::from_env())
    }

    pub fn save_store(&self) -> Result<()> {
        self.store.save(&self.store_path)
    }
}

/// `--config` file when given, else the global/project chain
pub fn load_config(options: &GlobalOptions) -> Result<Config> {
    match &options.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Section notes from a JSON file: `{"section-id": "text"}` or full `SectionContent` objects
pub fn read_section_notes(path: &Path) -> Result<BTreeMap<String, SectionContent>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Note {
        Text(String),
        Content(SectionContent),
    }

    let content = std::fs::read_to_string(path)?;
    let notes: BTreeMap<String, Note> = serde_json::from_str(&content)?;
    Ok(notes
        .into_iter()
        .map(|(id, note)| {
            let content = match note {
                Note::Text(raw_input) => SectionContent {
                    raw_input,
                    ..Default::default()
                },
                Note::Content(content) => content,
            };
            (id, content)
        })
        .collect())
}

pub fn write_or_print(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_section_notes_both_shapes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(
            &path,
            r#"{"1": "Ett bra år.", "2": {"raw_input": "Läger", "is_locked": true}}"#,
        )
        .unwrap();

        let notes = read_section_notes(&path).unwrap();
        assert_eq!(notes["1"].raw_input, "Ett bra år.");
        assert!(!notes["1"].is_locked);
        assert_eq!(notes["2"].raw_input, "Läger");
        assert!(notes["2"].is_locked);
    }

    #[test]
    fn test_missing_store_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let options = GlobalOptions {
            config: None,
            store: Some(dir.path().join("missing.json")),
            quiet: true,
        };
        assert!(matches!(
            CommandContext::load(&options),
            Err(ReportError::Storage(_))
        ));
    }

    #[test]
    fn test_write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/report.md");
        write_or_print(Some(&path), "# Rapport").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Rapport");
    }
}
