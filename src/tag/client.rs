//! Version-control client capability
//!
//! The sequencer consumes repository operations through this trait and
//! never talks to the network itself. The production implementation
//! drives the `svn` binary (see [`super::svn_cli`]); tests substitute a
//! recording fake.

use std::path::Path;

use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum SvnClientError {
    #[error("svn {op} failed: {message}")]
    CommandFailed { op: &'static str, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not determine committed revision from svn output")]
    MissingRevision,
    #[error("Destination {0} already exists")]
    DestinationExists(Url),
    #[error("The command-line client only supports pinning externals to their working revision")]
    UnsupportedExternalsPolicy,
}

/// Result of a committed repository operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub new_revision: u64,
}

/// Options shared by both copy modes.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Create missing intermediate directories at the destination.
    pub make_parents: bool,
    /// Error out if the destination already exists. Off for retagging,
    /// since the old tag was just deleted.
    pub fail_if_exists: bool,
}

/// Decides the revision an external is frozen at during a working-copy
/// copy. Receives the external's declared revision, its declared peg
/// revision, and its currently checked-out working revision; returns the
/// (revision, peg revision) pair to record in the tag.
pub type ExternalsPolicy = fn(Option<u64>, Option<u64>, u64) -> (u64, u64);

/// Pin every external to its checked-out working revision, ignoring
/// whatever the externals definition declares. This is what makes a tag
/// reproducible: externals are frozen at tag time instead of floating to
/// "latest" when the tag is later checked out.
pub fn peg_to_working(_declared: Option<u64>, _peg: Option<u64>, working: u64) -> (u64, u64) {
    (working, working)
}

/// Repository operations needed to retag a module.
pub trait SvnClient {
    /// Delete the given URLs in one commit.
    fn delete(&self, targets: &[Url], message: &str) -> Result<CommitInfo, SvnClientError>;

    /// Copy `source` pinned at exactly `revision` (peg and operative
    /// revision both) to `destination`.
    fn copy_pinned(
        &self,
        source: &Url,
        revision: u64,
        destination: &Url,
        options: CopyOptions,
        message: &str,
    ) -> Result<CommitInfo, SvnClientError>;

    /// Copy the current on-disk state of a working copy to `destination`,
    /// applying `externals` to every external reference encountered.
    /// Must run on the machine holding the live working copy.
    fn copy_working(
        &self,
        working_copy: &Path,
        destination: &Url,
        options: CopyOptions,
        message: &str,
        externals: ExternalsPolicy,
    ) -> Result<CommitInfo, SvnClientError>;
}
