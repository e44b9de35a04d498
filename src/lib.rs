pub mod config;
pub mod ledger;
pub mod tag;
pub mod template;
pub mod util;

pub use config::Config;
pub use ledger::{LedgerError, RevisionLedger};
pub use tag::{
    BuildInfo, CommitInfo, CopyOptions, Credentials, ExternalsPolicy, ModuleLocation, SkipReason,
    SvnClient, SvnClientError, SvnCommandClient, TagOutcome, TagReport, TagSequencer, TagSpec,
    TagStatus, TaggableBuildContext,
};
pub use template::{evaluate, TemplateContext, TemplateError};
