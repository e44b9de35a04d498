//! Tag transaction sequencing
//!
//! For every module of a successful build, in configuration order: resolve
//! the built revision from the ledger, evaluate the destination and
//! comment templates, delete whatever tag currently occupies the
//! destination, then copy the pinned revision (or the pegged working copy)
//! there. Strictly sequential; no module starts before the previous one
//! finishes, and nothing is retried or rolled back. The repository keeps
//! append-only history, so a run that fails halfway leaves the
//! already-committed tags in place by design.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use super::client::{peg_to_working, CopyOptions, SvnClient};
use super::context::{ModuleLocation, TaggableBuildContext};
use crate::template::{self, TemplateContext};
use crate::util::urls;

/// Templates and flags for one tag operation, shared across modules.
/// An explicit immutable value supplied by the caller.
#[derive(Debug, Clone)]
pub struct TagSpec {
    /// Destination template, resolved against each module's URL.
    pub tag_base_url: String,
    /// Commit message template for the tag copy.
    pub tag_comment: String,
    /// Commit message template for deleting a previous tag.
    pub tag_delete_comment: String,
    /// Copy the live working copy with externals frozen at their
    /// checked-out revisions, instead of the ledger revision.
    pub peg_externals: bool,
    /// One blocking pause for the whole run, taken between the first
    /// module's delete and its copy.
    pub wait_before_tagging: Option<Duration>,
}

impl Default for TagSpec {
    fn default() -> Self {
        Self {
            tag_base_url:
                "http://subversion_host/project/tags/last-successful/${env['JOB_NAME']}"
                    .to_string(),
            tag_comment: "Tagged by svn-tag. Build: ${env['BUILD_TAG']}.".to_string(),
            tag_delete_comment: "Cleared old tag by svn-tag.".to_string(),
            peg_externals: false,
            wait_before_tagging: None,
        }
    }
}

/// Why a module was passed over without being tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ledger has no revision for this module, typically because the
    /// project configuration changed since the recorded build.
    RevisionNotAvailable,
    /// The build did not end successfully.
    BuildNotSuccessful,
}

/// Terminal state of one module's tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    Tagged { revision: u64 },
    Skipped(SkipReason),
    Failed(String),
}

/// Per-module result, emitted in module order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOutcome {
    pub module: ModuleLocation,
    pub status: TagStatus,
}

/// Aggregate result of a tag operation: one outcome per attempted module
/// plus the human-readable step log.
#[derive(Debug, Clone, Default)]
pub struct TagReport {
    pub outcomes: Vec<TagOutcome>,
    pub log: Vec<String>,
}

impl TagReport {
    /// True only if every module reached Tagged or Skipped.
    pub fn success(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| matches!(o.status, TagStatus::Failed(_)))
    }

    fn log_line(&mut self, line: String) {
        tracing::info!("{line}");
        self.log.push(line);
    }
}

/// How one module's tagging ended, from the run's point of view.
enum ModuleEnd {
    Tagged(u64),
    Skip(SkipReason),
    /// Fatal for the whole run: no further modules are attempted.
    Abort(String),
}

/// Drives the delete-then-copy retag protocol across all modules.
pub struct TagSequencer {
    spec: TagSpec,
    system_properties: HashMap<String, String>,
}

impl TagSequencer {
    pub fn new(spec: TagSpec, system_properties: HashMap<String, String>) -> Self {
        Self {
            spec,
            system_properties,
        }
    }

    /// Run the tag operation. Returns a report rather than an error: a
    /// failed module shows up as a `Failed` outcome that ends the run,
    /// while skips and delete failures are recorded and passed over.
    pub fn run(
        &self,
        context: &dyn TaggableBuildContext,
        client: &dyn SvnClient,
    ) -> TagReport {
        let mut report = TagReport::default();

        if !context.build_succeeded() {
            report.log_line("Build was not successful; nothing to tag.".to_string());
            for module in context.module_locations() {
                report.outcomes.push(TagOutcome {
                    module: module.clone(),
                    status: TagStatus::Skipped(SkipReason::BuildNotSuccessful),
                });
            }
            return report;
        }

        // The wait, if configured, happens once per run.
        let mut waited = false;
        for module in context.module_locations() {
            let end = self.tag_module(module, context, client, &mut report, &mut waited);
            let status = match end {
                ModuleEnd::Tagged(revision) => TagStatus::Tagged { revision },
                ModuleEnd::Skip(reason) => TagStatus::Skipped(reason),
                ModuleEnd::Abort(message) => TagStatus::Failed(message),
            };
            let failed = matches!(status, TagStatus::Failed(_));
            report.outcomes.push(TagOutcome {
                module: module.clone(),
                status,
            });
            if failed {
                break;
            }
        }

        report
    }

    fn tag_module(
        &self,
        module: &ModuleLocation,
        context: &dyn TaggableBuildContext,
        client: &dyn SvnClient,
        report: &mut TagReport,
        waited: &mut bool,
    ) -> ModuleEnd {
        // RESOLVE: canonical URL and ledger revision.
        let canonical = match urls::canonicalize(&module.remote) {
            Ok(canonical) => canonical,
            Err(error) => {
                let message =
                    format!("Failed to parse repository URL {}: {error}", module.remote);
                report.log_line(message.clone());
                return ModuleEnd::Abort(message);
            }
        };

        let revision = context.revision_ledger().revision_of(&canonical);
        match revision {
            Some(revision) => report.log_line(format!("Module location: {canonical}@{revision}")),
            None if self.spec.peg_externals => {
                // The copy source is the working copy, so a ledger miss
                // does not block the module.
                report.log_line(format!("Module location: {canonical} (working copy)"));
            }
            None => {
                report.log_line(format!(
                    "No revision recorded for {canonical}; skipping."
                ));
                return ModuleEnd::Skip(SkipReason::RevisionNotAvailable);
            }
        }

        // Templates: destination and comments. Any template failure means
        // a correct tag cannot be produced, so the whole run stops.
        let template_context = TemplateContext::for_module(
            context.environment(),
            &self.system_properties,
            &canonical,
        );

        let destination = match self.resolve_destination(&canonical, &template_context) {
            Ok(destination) => destination,
            Err(message) => {
                report.log_line(message.clone());
                return ModuleEnd::Abort(message);
            }
        };
        report.log_line(format!("Tag base URL: {destination}"));

        let delete_comment =
            match template::evaluate(&self.spec.tag_delete_comment, &template_context) {
                Ok(comment) => comment,
                Err(error) => {
                    let message =
                        format!("Failed to evaluate tag delete comment template: {error}");
                    report.log_line(message.clone());
                    return ModuleEnd::Abort(message);
                }
            };

        // DELETE_OLD: tolerant. Nothing to delete, or a failed delete,
        // never blocks the copy. This is what makes the operation a
        // retag instead of create-once.
        match client.delete(&[destination.clone()], &delete_comment) {
            Ok(_) => report.log_line(format!("Deleted old tag {destination}.")),
            Err(error) => report.log_line(format!(
                "There was no old tag at {destination} ({error}); continuing."
            )),
        }

        if !*waited {
            *waited = true;
            if let Some(delay) = self.spec.wait_before_tagging {
                report.log_line(format!(
                    "Waiting {}s before tagging.",
                    delay.as_secs()
                ));
                std::thread::sleep(delay);
            }
        }

        let tag_comment = match template::evaluate(&self.spec.tag_comment, &template_context) {
            Ok(comment) => comment,
            Err(error) => {
                let message = format!("Failed to evaluate tag comment template: {error}");
                report.log_line(message.clone());
                return ModuleEnd::Abort(message);
            }
        };

        // COPY: fatal on error, aborting the run. Tags committed by
        // earlier modules stay committed.
        let options = CopyOptions {
            make_parents: true,
            fail_if_exists: false,
        };

        let copied = if self.spec.peg_externals {
            let working_copy = context.workspace_root().join(&module.local_dir);
            client.copy_working(
                &working_copy,
                &destination,
                options,
                &tag_comment,
                peg_to_working,
            )
        } else {
            let source = match Url::parse(&canonical) {
                Ok(source) => source,
                Err(error) => {
                    let message =
                        format!("Failed to parse repository URL {canonical}: {error}");
                    report.log_line(message.clone());
                    return ModuleEnd::Abort(message);
                }
            };
            // Checked present during RESOLVE for the non-pegged mode.
            let Some(revision) = revision else {
                return ModuleEnd::Skip(SkipReason::RevisionNotAvailable);
            };
            client.copy_pinned(&source, revision, &destination, options, &tag_comment)
        };

        match copied {
            Ok(info) => {
                report.log_line(format!("Tagged (committed revision {}).", info.new_revision));
                ModuleEnd::Tagged(info.new_revision)
            }
            Err(error) => {
                let message = format!("Failed to create tag {destination}: {error}");
                report.log_line(message.clone());
                ModuleEnd::Abort(message)
            }
        }
    }

    /// Evaluate the destination template and resolve it against the
    /// module URL treated as a directory.
    fn resolve_destination(
        &self,
        canonical: &str,
        template_context: &TemplateContext,
    ) -> Result<Url, String> {
        let evaluated = template::evaluate(&self.spec.tag_base_url, template_context)
            .map_err(|error| format!("Failed to evaluate tag base URL template: {error}"))?;
        urls::resolve_destination(canonical, &evaluated).map_err(|error| {
            format!("Failed to resolve tag base URL '{evaluated}' against {canonical}: {error}")
        })
    }
}
