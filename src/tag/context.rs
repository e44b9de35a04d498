//! Build context consumed by the sequencer
//!
//! The sequencer needs exactly three things from the build that just
//! finished: which modules it pulled, what revisions it recorded, and its
//! environment. [`TaggableBuildContext`] exposes those as one flat
//! capability; [`BuildInfo`] is the concrete implementation the CLI wires
//! up from config and the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ledger::{LedgerError, RevisionLedger};

/// One unit of source the build pulled from version control.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleLocation {
    /// Repository URL of the module.
    pub remote: String,
    /// Checkout directory, relative to the workspace root.
    pub local_dir: PathBuf,
}

/// What the sequencer is allowed to know about a finished build.
pub trait TaggableBuildContext {
    /// Whether the build ended successfully. Tagging an unsuccessful
    /// build is refused, not attempted-and-failed.
    fn build_succeeded(&self) -> bool;

    /// Module locations in build-configuration order. Tagging follows
    /// this order exactly.
    fn module_locations(&self) -> &[ModuleLocation];

    /// The revision ledger recorded by the build.
    fn revision_ledger(&self) -> &RevisionLedger;

    /// Build environment variables, shared by every module's template
    /// context.
    fn environment(&self) -> &HashMap<String, String>;

    /// Root under which the modules' `local_dir`s live. Only needed for
    /// the pegged-externals copy mode.
    fn workspace_root(&self) -> &Path;
}

/// Build context assembled by the CLI.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    build_succeeded: bool,
    workspace_root: PathBuf,
    modules: Vec<ModuleLocation>,
    ledger: RevisionLedger,
    environment: HashMap<String, String>,
}

impl BuildInfo {
    pub fn new(
        build_succeeded: bool,
        workspace_root: PathBuf,
        modules: Vec<ModuleLocation>,
        ledger: RevisionLedger,
        environment: HashMap<String, String>,
    ) -> Self {
        Self {
            build_succeeded,
            workspace_root,
            modules,
            ledger,
            environment,
        }
    }

    /// Assemble a context from the on-disk ledger and the process
    /// environment. The build counts as successful unless `BUILD_RESULT`
    /// is set to something other than `SUCCESS`.
    pub fn load(
        ledger_path: &Path,
        workspace_root: PathBuf,
        modules: Vec<ModuleLocation>,
    ) -> Result<Self, LedgerError> {
        let ledger = RevisionLedger::parse_file(ledger_path)?;
        let environment: HashMap<String, String> = std::env::vars().collect();
        let build_succeeded = environment
            .get("BUILD_RESULT")
            .map(|r| r.eq_ignore_ascii_case("success"))
            .unwrap_or(true);

        Ok(Self::new(
            build_succeeded,
            workspace_root,
            modules,
            ledger,
            environment,
        ))
    }
}

impl TaggableBuildContext for BuildInfo {
    fn build_succeeded(&self) -> bool {
        self.build_succeeded
    }

    fn module_locations(&self) -> &[ModuleLocation] {
        &self.modules
    }

    fn revision_ledger(&self) -> &RevisionLedger {
        &self.ledger
    }

    fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
