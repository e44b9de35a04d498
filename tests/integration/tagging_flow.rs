//! End-to-end sequencer flows against the recording fake client

use std::collections::HashMap;
use std::path::PathBuf;

use svn_tag::{
    BuildInfo, ModuleLocation, RevisionLedger, SkipReason, TagSequencer, TagSpec, TagStatus,
};

use super::common::mock_svn::{MockSvn, SvnCall};

fn module(remote: &str, local_dir: &str) -> ModuleLocation {
    ModuleLocation {
        remote: remote.to_string(),
        local_dir: PathBuf::from(local_dir),
    }
}

fn build_context(ledger: &str, modules: Vec<ModuleLocation>) -> BuildInfo {
    let mut env = HashMap::new();
    env.insert("JOB_NAME".to_string(), "nightly".to_string());
    env.insert("BUILD_TAG".to_string(), "jenkins-nightly-7".to_string());
    BuildInfo::new(
        true,
        PathBuf::from("/ws"),
        modules,
        RevisionLedger::parse(ledger),
        env,
    )
}

fn spec_with_base(tag_base_url: &str) -> TagSpec {
    TagSpec {
        tag_base_url: tag_base_url.to_string(),
        ..TagSpec::default()
    }
}

fn sequencer(spec: TagSpec) -> TagSequencer {
    TagSequencer::new(spec, HashMap::new())
}

/// The ledger revision is copied, pinned, to the resolved destination.
#[test]
fn test_tags_ledger_revision_at_resolved_destination() {
    let context = build_context(
        "http://host/repo/trunk/5\n",
        vec![module("http://host/repo/trunk", ".")],
    );
    let client = MockSvn::new();

    let report = sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    assert!(report.success());
    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(
        report.outcomes[0].status,
        TagStatus::Tagged { .. }
    ));

    let copy = client
        .calls()
        .into_iter()
        .find_map(|c| match c {
            SvnCall::CopyPinned {
                source,
                revision,
                destination,
                make_parents,
                ..
            } => Some((source, revision, destination, make_parents)),
            _ => None,
        })
        .expect("a pinned copy was made");
    assert_eq!(copy.0.as_str(), "http://host/repo/trunk");
    assert_eq!(copy.1, 5);
    assert_eq!(copy.2.as_str(), "http://host/repo/tags/trunk");
    assert!(copy.3, "intermediate tag directories are created");
}

#[test]
fn test_delete_precedes_copy() {
    let context = build_context(
        "http://host/repo/trunk/5\n",
        vec![module("http://host/repo/trunk", ".")],
    );
    let client = MockSvn::new();

    sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], SvnCall::Delete { .. }));
    assert!(matches!(calls[1], SvnCall::CopyPinned { .. }));

    let SvnCall::Delete { ref targets, .. } = calls[0] else {
        unreachable!()
    };
    assert_eq!(targets[0].as_str(), "http://host/repo/tags/trunk");
}

/// A module without a ledger entry is skipped, and the run still
/// succeeds.
#[test]
fn test_missing_ledger_entry_skips_module() {
    let context = build_context(
        "http://host/repo/core/101\n",
        vec![
            module("http://host/repo/core", "core"),
            module("http://host/repo/plugins", "plugins"),
        ],
    );
    let client = MockSvn::new();

    let report = sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    assert!(report.success());
    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        report.outcomes[0].status,
        TagStatus::Tagged { .. }
    ));
    assert_eq!(
        report.outcomes[1].status,
        TagStatus::Skipped(SkipReason::RevisionNotAvailable)
    );

    let copies = client
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SvnCall::CopyPinned { .. }))
        .count();
    assert_eq!(copies, 1, "the skipped module is never copied");
}

/// A failed delete (no old tag to remove) is logged and the copy still
/// happens.
#[test]
fn test_failed_delete_does_not_block_copy() {
    let context = build_context(
        "http://host/repo/trunk/5\n",
        vec![module("http://host/repo/trunk", ".")],
    );
    let client = MockSvn::new().failing_deletes();

    let report = sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    assert!(report.success());
    assert!(matches!(
        report.outcomes[0].status,
        TagStatus::Tagged { .. }
    ));
    assert!(
        report.log.iter().any(|l| l.contains("continuing")),
        "the delete failure shows up in the log"
    );
}

/// A copy failure fails the run, keeps the earlier module's tag, and
/// never attempts later modules.
#[test]
fn test_copy_failure_aborts_remaining_modules() {
    let context = build_context(
        "http://host/repo/core/1\nhttp://host/repo/plugins/2\nhttp://host/repo/docs/3\n",
        vec![
            module("http://host/repo/core", "core"),
            module("http://host/repo/plugins", "plugins"),
            module("http://host/repo/docs", "docs"),
        ],
    );
    let client = MockSvn::new().failing_copy_to("tags/plugins");

    let report = sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    assert!(!report.success());
    assert_eq!(report.outcomes.len(), 2, "docs is never attempted");
    assert!(matches!(
        report.outcomes[0].status,
        TagStatus::Tagged { .. }
    ));
    assert!(matches!(report.outcomes[1].status, TagStatus::Failed(_)));

    let copied: Vec<_> = client
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            SvnCall::CopyPinned { destination, .. } => Some(destination.as_str().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(copied, vec!["http://host/repo/tags/core".to_string()]);
}

/// An unresolved template variable stops the run before any repository
/// call for that module.
#[test]
fn test_template_error_aborts_run() {
    let context = build_context(
        "http://host/repo/trunk/5\n",
        vec![module("http://host/repo/trunk", ".")],
    );
    let client = MockSvn::new();

    let report = sequencer(spec_with_base("../tags/${env['NO_SUCH_VAR']}")).run(&context, &client);

    assert!(!report.success());
    assert!(matches!(report.outcomes[0].status, TagStatus::Failed(_)));
    assert!(client.calls().is_empty(), "no repository calls were made");
}

/// Pegged mode copies the on-disk working copy and pins externals to
/// their checked-out working revision.
#[test]
fn test_pegged_externals_copies_working_copy() {
    // No ledger entry: pegged mode does not need one.
    let context = build_context("", vec![module("http://host/repo/trunk", "trunk")]);
    let client = MockSvn::new();
    let spec = TagSpec {
        peg_externals: true,
        ..spec_with_base("../tags/${repoURL[-1]}")
    };

    let report = sequencer(spec).run(&context, &client);

    assert!(report.success());
    let copy = client
        .calls()
        .into_iter()
        .find_map(|c| match c {
            SvnCall::CopyWorking {
                working_copy,
                destination,
                sample_pin,
                ..
            } => Some((working_copy, destination, sample_pin)),
            _ => None,
        })
        .expect("a working-copy copy was made");
    assert_eq!(copy.0, PathBuf::from("/ws/trunk"));
    assert_eq!(copy.1.as_str(), "http://host/repo/tags/trunk");
    assert_eq!(
        copy.2,
        (7, 7),
        "externals are pinned to the working revision, not the declared one"
    );
}

#[test]
fn test_unsuccessful_build_tags_nothing() {
    let mut env = HashMap::new();
    env.insert("JOB_NAME".to_string(), "nightly".to_string());
    let context = BuildInfo::new(
        false,
        PathBuf::from("/ws"),
        vec![module("http://host/repo/trunk", ".")],
        RevisionLedger::parse("http://host/repo/trunk/5\n"),
        env,
    );
    let client = MockSvn::new();

    let report = sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    assert!(report.success());
    assert_eq!(
        report.outcomes[0].status,
        TagStatus::Skipped(SkipReason::BuildNotSuccessful)
    );
    assert!(client.calls().is_empty());
}

/// Destination naming is a pure function of the context: two runs over
/// unchanged inputs resolve the same tag URL.
#[test]
fn test_destination_is_stable_across_runs() {
    let destination_of = |client: &MockSvn| -> String {
        client
            .calls()
            .into_iter()
            .find_map(|c| match c {
                SvnCall::CopyPinned { destination, .. } => {
                    Some(destination.as_str().to_string())
                }
                _ => None,
            })
            .expect("a copy was made")
    };

    let first = MockSvn::new();
    let second = MockSvn::new();
    for client in [&first, &second] {
        let context = build_context(
            "http://host/repo/trunk/5\n",
            vec![module("http://host/repo/trunk", ".")],
        );
        sequencer(spec_with_base("../tags/${env['JOB_NAME']}-${repoURL[-1]}"))
            .run(&context, client);
    }

    assert_eq!(destination_of(&first), destination_of(&second));
    assert_eq!(
        destination_of(&first),
        "http://host/repo/tags/nightly-trunk"
    );
}

/// The configured wait is one blocking pause for the whole run, taken
/// before the first copy, not once per module.
#[test]
fn test_wait_before_tagging_pauses_once() {
    use std::time::{Duration, Instant};

    let context = build_context(
        "http://host/repo/core/1\nhttp://host/repo/plugins/2\n",
        vec![
            module("http://host/repo/core", "core"),
            module("http://host/repo/plugins", "plugins"),
        ],
    );
    let client = MockSvn::new();
    let spec = TagSpec {
        wait_before_tagging: Some(Duration::from_millis(50)),
        ..spec_with_base("../tags/${repoURL[-1]}")
    };

    let started = Instant::now();
    let report = sequencer(spec).run(&context, &client);

    assert!(report.success());
    assert!(started.elapsed() >= Duration::from_millis(50));
    let waits = report
        .log
        .iter()
        .filter(|l| l.starts_with("Waiting"))
        .count();
    assert_eq!(waits, 1, "both modules tag after a single pause");
}

/// Evaluated commit messages reach the client for both delete and copy.
#[test]
fn test_comments_are_evaluated() {
    let context = build_context(
        "http://host/repo/trunk/5\n",
        vec![module("http://host/repo/trunk", ".")],
    );
    let client = MockSvn::new();

    sequencer(spec_with_base("../tags/${repoURL[-1]}")).run(&context, &client);

    let calls = client.calls();
    let SvnCall::Delete { ref message, .. } = calls[0] else {
        unreachable!()
    };
    assert_eq!(message, "Cleared old tag by svn-tag.");
    let SvnCall::CopyPinned { ref message, .. } = calls[1] else {
        unreachable!()
    };
    assert_eq!(message, "Tagged by svn-tag. Build: jenkins-nightly-7.");
}
