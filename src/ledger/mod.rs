//! Revision ledger parsing
//!
//! Each successful build persists a plain-text record of what was actually
//! checked out: one `<repositoryURL>/<revision>` line per module. The
//! environment's `SVN_REVISION` is useless with multiple modules, so the
//! ledger is the only authoritative source for the revision to tag.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::util::urls;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read revision ledger {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Mapping from canonical repository URL to the revision that was built.
///
/// Built once per tag operation and immutable thereafter. Keys go through
/// the same canonicalization as module locations (see [`urls::canonicalize`])
/// so lookups on either side cannot diverge.
#[derive(Debug, Clone, Default)]
pub struct RevisionLedger {
    revisions: HashMap<String, u64>,
}

impl RevisionLedger {
    /// Parse the ledger file of a build.
    ///
    /// A missing file is the first-build case and yields an empty ledger.
    /// Malformed lines (no `/` separator, non-numeric revision, unparsable
    /// URL) are skipped; only an unreadable existing file is an error.
    pub fn parse_file(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| LedgerError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self::parse(&contents))
    }

    /// Parse ledger text. Never fails; invalid lines are dropped.
    pub fn parse(contents: &str) -> Self {
        let mut revisions = HashMap::new();

        for line in contents.lines() {
            let line = line.trim_end();
            let Some(index) = line.rfind('/') else {
                continue; // invalid line?
            };

            let Ok(revision) = line[index + 1..].parse::<u64>() else {
                continue;
            };
            let Ok(key) = urls::canonicalize(&line[..index]) else {
                continue;
            };

            revisions.insert(key, revision);
        }

        Self { revisions }
    }

    /// Look up the built revision for a canonical repository URL.
    pub fn revision_of(&self, canonical_url: &str) -> Option<u64> {
        self.revisions.get(canonical_url).copied()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}
