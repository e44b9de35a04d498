//! Subversion operations via the `svn` command-line client

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use url::Url;

use super::client::{
    peg_to_working, CommitInfo, CopyOptions, ExternalsPolicy, SvnClient, SvnClientError,
};

/// Repository credentials passed to every `svn` invocation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// [`SvnClient`] backed by the `svn` binary.
#[derive(Debug, Clone)]
pub struct SvnCommandClient {
    svn_path: PathBuf,
    credentials: Credentials,
}

impl SvnCommandClient {
    pub fn new(svn_path: PathBuf, credentials: Credentials) -> Self {
        Self {
            svn_path,
            credentials,
        }
    }

    /// Base `svn` invocation with authentication flags applied.
    fn svn(&self) -> Command {
        let mut cmd = Command::new(&self.svn_path);
        cmd.args(["--non-interactive", "--no-auth-cache"]);
        cmd.args(["--username", &self.credentials.username]);
        if let Some(password) = &self.credentials.password {
            cmd.args(["--password", password]);
        }
        cmd
    }

    /// Run a prepared command, returning stdout on success and the
    /// trimmed stderr as the error message otherwise.
    fn run(&self, op: &'static str, cmd: &mut Command) -> Result<String, SvnClientError> {
        debug!(?cmd, op, "Running svn");
        let output = cmd.output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => String::from_utf8_lossy(&output.stdout).trim().to_string(),
                s => s.to_string(),
            };
            Err(SvnClientError::CommandFailed { op, message })
        }
    }

    fn exists(&self, url: &Url) -> bool {
        let mut cmd = self.svn();
        cmd.args(["info", url.as_str()]);
        match cmd.output() {
            Ok(output) => output.status.success(),
            Err(error) => {
                warn!(error = %error, url = %url, "Failed to run svn info");
                false
            }
        }
    }

    /// Create the destination's parent path by importing a transient
    /// empty directory. Old servers reject `copy --parents`; importing an
    /// empty directory creates every missing intermediate instead. The
    /// temporary directory is removed on all exit paths, including
    /// failure, when the guard drops.
    fn create_parents(&self, destination: &Url, message: &str) -> Result<(), SvnClientError> {
        let parent = destination
            .join(".")
            .map_err(|e| SvnClientError::CommandFailed {
                op: "import",
                message: e.to_string(),
            })?;

        let empty_dir = tempfile::tempdir()?;
        let mut cmd = self.svn();
        cmd.arg("import")
            .arg(empty_dir.path())
            .arg(parent.as_str())
            .args(["-m", message]);
        self.run("import", &mut cmd)?;
        Ok(())
    }

    /// Assemble the full `svn copy` invocation for either copy mode.
    fn copy_command(
        &self,
        source_args: &[String],
        with_parents: bool,
        destination: &Url,
        message: &str,
    ) -> Command {
        let mut cmd = self.svn();
        cmd.arg("copy");
        if with_parents {
            cmd.arg("--parents");
        }
        cmd.args(source_args);
        cmd.arg(destination.as_str());
        cmd.args(["-m", message]);
        cmd
    }

    /// Run an `svn copy`, falling back to the empty-directory import
    /// workaround when the server or client cannot create parents itself.
    fn copy(
        &self,
        source_args: &[String],
        options: CopyOptions,
        destination: &Url,
        message: &str,
    ) -> Result<CommitInfo, SvnClientError> {
        if options.fail_if_exists && self.exists(destination) {
            return Err(SvnClientError::DestinationExists(destination.clone()));
        }

        let first = self.run(
            "copy",
            &mut self.copy_command(source_args, options.make_parents, destination, message),
        );
        let stdout = match first {
            Ok(stdout) => stdout,
            Err(SvnClientError::CommandFailed { message: ref m, .. })
                if options.make_parents && needs_parent_workaround(m) =>
            {
                debug!(destination = %destination, "Retrying copy after creating parents");
                self.create_parents(destination, message)?;
                // Parents now exist, so the flag old clients choke on is
                // no longer needed.
                self.run(
                    "copy",
                    &mut self.copy_command(source_args, false, destination, message),
                )?
            }
            Err(e) => return Err(e),
        };

        parse_committed_revision(&stdout)
            .map(|new_revision| CommitInfo { new_revision })
            .ok_or(SvnClientError::MissingRevision)
    }
}

/// Source arguments for a revision-pinned copy: peg and operative
/// revision are both the ledger revision, so the copied tree is exactly
/// what the build checked out.
fn pinned_source_args(source: &Url, revision: u64) -> Vec<String> {
    vec![
        "-r".to_string(),
        revision.to_string(),
        format!("{source}@{revision}"),
    ]
}

/// Source arguments for a working-copy copy with externals frozen at
/// their checked-out revisions.
fn working_copy_args(working_copy: &Path) -> Vec<String> {
    vec![
        "--pin-externals".to_string(),
        working_copy.to_string_lossy().into_owned(),
    ]
}

impl SvnClient for SvnCommandClient {
    fn delete(&self, targets: &[Url], message: &str) -> Result<CommitInfo, SvnClientError> {
        let mut cmd = self.svn();
        cmd.arg("delete");
        for target in targets {
            cmd.arg(target.as_str());
        }
        cmd.args(["-m", message]);
        let stdout = self.run("delete", &mut cmd)?;
        parse_committed_revision(&stdout)
            .map(|new_revision| CommitInfo { new_revision })
            .ok_or(SvnClientError::MissingRevision)
    }

    fn copy_pinned(
        &self,
        source: &Url,
        revision: u64,
        destination: &Url,
        options: CopyOptions,
        message: &str,
    ) -> Result<CommitInfo, SvnClientError> {
        self.copy(
            &pinned_source_args(source, revision),
            options,
            destination,
            message,
        )
    }

    fn copy_working(
        &self,
        working_copy: &Path,
        destination: &Url,
        options: CopyOptions,
        message: &str,
        externals: ExternalsPolicy,
    ) -> Result<CommitInfo, SvnClientError> {
        // `svn copy --pin-externals` freezes every external at its
        // checked-out revision, which is what peg_to_working computes.
        // Any other policy would commit a tag with the wrong pins.
        if externals(Some(1), Some(2), 3) != peg_to_working(Some(1), Some(2), 3) {
            return Err(SvnClientError::UnsupportedExternalsPolicy);
        }

        self.copy(
            &working_copy_args(working_copy),
            options,
            destination,
            message,
        )
    }
}

/// Pull the new revision out of `svn` commit output
/// ("Committed revision 1234.").
fn parse_committed_revision(output: &str) -> Option<u64> {
    output.lines().rev().find_map(|line| {
        line.trim()
            .strip_prefix("Committed revision ")?
            .trim_end_matches('.')
            .parse()
            .ok()
    })
}

fn needs_parent_workaround(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    // E160013: path not found on the server; old clients instead reject
    // the --parents flag outright.
    stderr.contains("E160013")
        || lower.contains("path not found")
        || lower.contains("invalid option: --parents")
}
