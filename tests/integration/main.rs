use dossier::config::AppConfig;
use dossier::store::CanonicalStore;
use std::env;
use std::path::Path;
use tempfile::TempDir;

/// Shared fixture: a temporary workspace with a canonical store rooted
/// inside it. Provider, model, and embedder fakes live in `support`.
pub struct PipelineHarness {
    workspace: TempDir,
}

impl PipelineHarness {
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("failed to create temp workspace");
        env::set_var("DOSSIER_HOME", workspace.path());
        Self { workspace }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn config(&self) -> AppConfig {
        AppConfig::default()
    }

    pub fn store(&self) -> CanonicalStore {
        CanonicalStore::new(self.workspace.path().join("runs"))
    }
}

mod support;

mod consent_policy;
mod pipeline_direct;
mod pipeline_failures;
mod pipeline_search;
mod report_fallback;
mod run_cancel;
