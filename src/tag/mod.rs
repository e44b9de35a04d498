//! Tag synchronization engine

mod client;
mod context;
mod sequencer;
mod svn_cli;

pub use client::{
    peg_to_working, CommitInfo, CopyOptions, ExternalsPolicy, SvnClient, SvnClientError,
};
pub use context::{BuildInfo, ModuleLocation, TaggableBuildContext};
pub use sequencer::{SkipReason, TagOutcome, TagReport, TagSequencer, TagSpec, TagStatus};
pub use svn_cli::{Credentials, SvnCommandClient};
