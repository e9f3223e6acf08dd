//! End-to-end pipeline tests: token files through facets and consolidation.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use e2e_tests::{day, window, write_story, write_token_file, TestHarness, COMMUNITY};
use tdt_facets::{RescannedMap, TopicMap};
use tdt_graph::retrieve_info_map;
use tdt_pipeline::{NoOpProgressCallback, PipelineRunner, SessionOutcome};
use tdt_types::{Scope, WindowArtifact};

const STORM: [&str; 4] = ["storm", "coast", "flood", "warning"];

/// Two windows telling the same story get one facet each, and the
/// dictionary maps the story's words to both.
#[test]
fn test_two_windows_share_a_dictionary() {
    let harness = TestHarness::new();
    let first = window((1, 1), (1, 7));
    let second = window((1, 8), (1, 14));
    let dir1 = harness.input_dir("week1");
    let dir2 = harness.input_dir("week2");
    write_story(&dir1, "a", day(1, 1), &STORM);
    write_story(&dir2, "c", day(1, 9), &STORM);

    let (report1, _) = harness.run_window(&dir1, first);
    let (report2, _) = harness.run_window(&dir2, second);
    assert_eq!(report1.facets, 1);
    assert_eq!(report2.facets, 1);
    assert_eq!(report1.merge.unwrap().new_keys, vec![1]);
    assert_eq!(report2.merge.unwrap().new_keys, vec![2]);

    let labels = harness.labels();
    let consolidator = harness.consolidator();
    let storm = labels.lookup("storm").unwrap();
    assert_eq!(
        consolidator.dictionary().facets(storm).cloned(),
        Some(BTreeSet::from([1, 2]))
    );
    assert_eq!(consolidator.scopes().scope_of(1), Some(first));
    assert_eq!(consolidator.scopes().scope_of(2), Some(second));

    let docs = harness.docs();
    let a1 = docs.lookup("a1").unwrap();
    let c2 = docs.lookup("c2").unwrap();
    assert_eq!(docs.get(a1).unwrap().facets, BTreeSet::from([1]));
    assert_eq!(docs.get(c2).unwrap().facets, BTreeSet::from([2]));

    let info = retrieve_info_map(&harness.storage, COMMUNITY, &first)
        .unwrap()
        .unwrap();
    assert!(info.contains(storm));
}

/// A document left unused in one window joins a matching facet of the next
/// window, and its evidence is read from the window it came from.
#[test]
fn test_unused_document_is_rescanned_into_later_window() {
    let harness = TestHarness::new();
    let first = window((1, 1), (1, 7));
    let second = window((1, 8), (1, 14));
    let dir1 = harness.input_dir("week1");
    let dir2 = harness.input_dir("week2");

    write_story(&dir1, "a", day(1, 1), &STORM);
    write_token_file(&dir1, "u", "wire", day(1, 3), &["market", "price", "rally", "today"]);
    write_token_file(&dir1, "m", "post", day(1, 2), &["rally", "price", "market"]);
    write_story(&dir2, "b", day(1, 9), &["market", "price", "rally", "strong"]);

    let (report1, _) = harness.run_window(&dir1, first);
    assert_eq!(report1.facets, 1);
    assert_eq!(report1.unused, 2);
    let docs = harness.docs();
    let u = docs.lookup("u").unwrap();
    let m = docs.lookup("m").unwrap();
    assert_eq!(harness.backlog().doc_ids(), BTreeSet::from([u, m]));

    let (report2, _) = harness.run_window(&dir2, second);
    assert_eq!(report2.facets, 1);
    assert_eq!(report2.rescanned, 1);
    assert_eq!(report2.purged, 0);
    let merge = report2.merge.unwrap();
    assert_eq!(merge.expanded_docs, 1);
    assert!(merge.docs_without_evidence.is_empty());

    let rescanned: RescannedMap = harness
        .storage
        .get_window(COMMUNITY, &second, WindowArtifact::Rescanned)
        .unwrap()
        .unwrap();
    assert_eq!(rescanned[&u].origin, first);
    assert_eq!(rescanned[&u].facet, 1);
    assert_eq!(harness.backlog().doc_ids(), BTreeSet::from([m]));

    let docs = harness.docs();
    assert_eq!(docs.get(u).unwrap().facets, BTreeSet::from([2]));
    assert!(docs.get(m).unwrap().facets.is_empty());

    let labels = harness.labels();
    let consolidator = harness.consolidator();
    let market = labels.lookup("market").unwrap();
    let today = labels.lookup("today").unwrap();
    assert_eq!(
        consolidator.dictionary().facets(market).cloned(),
        Some(BTreeSet::from([2]))
    );
    assert!(consolidator.dictionary().facets(today).is_none());
}

/// Forcing a finished window again changes no global structure.
#[test]
fn test_forced_rerun_is_idempotent() {
    let harness = TestHarness::new();
    let scope = window((1, 1), (1, 7));
    let dir = harness.input_dir("week1");
    write_story(&dir, "a", day(1, 1), &STORM);
    write_story(&dir, "b", day(1, 3), &["market", "price", "rally"]);

    harness.run_window(&dir, scope);
    let docs_before = harness.docs();
    let labels_before = harness.labels().len();
    let entries_before = harness.consolidator().dictionary().entry_count();

    let mut ctx = harness.open_session(CancellationToken::new());
    let mut runner = PipelineRunner::new(&mut ctx, &NoOpProgressCallback);
    assert_eq!(
        runner.run_window(&dir, scope, false).unwrap(),
        SessionOutcome::Skipped
    );
    let outcome = runner.run_window(&dir, scope, true).unwrap();
    let SessionOutcome::Completed(report) = outcome else {
        panic!("Expected a completed rerun");
    };
    assert_eq!(report.docs_added, 4);
    let merge = report.merge.unwrap();
    assert!(merge.new_keys.is_empty());
    assert_eq!(merge.entries_added, 0);

    assert_eq!(harness.docs(), docs_before);
    assert_eq!(harness.labels().len(), labels_before);
    assert_eq!(
        harness.consolidator().dictionary().entry_count(),
        entries_before
    );
}

/// Forcing a window again keeps the documents an earlier run rescanned
/// into it.
#[test]
fn test_forced_rerun_keeps_rescanned_documents() {
    let harness = TestHarness::new();
    let first = window((1, 1), (1, 7));
    let second = window((1, 8), (1, 14));
    let dir1 = harness.input_dir("week1");
    let dir2 = harness.input_dir("week2");

    write_story(&dir1, "a", day(1, 1), &STORM);
    write_token_file(&dir1, "u", "wire", day(1, 3), &["market", "price", "rally", "today"]);
    write_token_file(&dir1, "m", "post", day(1, 2), &["rally", "price", "market"]);
    write_story(&dir2, "b", day(1, 9), &["market", "price", "rally", "strong"]);
    harness.run_window(&dir1, first);
    harness.run_window(&dir2, second);
    let docs_before = harness.docs();
    let u = docs_before.lookup("u").unwrap();
    let m = docs_before.lookup("m").unwrap();

    let mut ctx = harness.open_session(CancellationToken::new());
    let outcome = PipelineRunner::new(&mut ctx, &NoOpProgressCallback)
        .run_window(&dir2, second, true)
        .unwrap();
    let SessionOutcome::Completed(report) = outcome else {
        panic!("Expected a completed rerun");
    };
    assert_eq!(report.rescanned, 1);
    assert!(report.merge.unwrap().new_keys.is_empty());

    let topics: TopicMap = harness
        .storage
        .get_window(COMMUNITY, &second, WindowArtifact::Topics)
        .unwrap()
        .unwrap();
    assert!(topics[&1].contains(&u));
    let rescanned: RescannedMap = harness
        .storage
        .get_window(COMMUNITY, &second, WindowArtifact::Rescanned)
        .unwrap()
        .unwrap();
    assert_eq!(rescanned[&u].origin, first);
    assert_eq!(harness.backlog().doc_ids(), BTreeSet::from([m]));
    assert_eq!(harness.docs(), docs_before);

    let b1 = docs_before.lookup("b1").unwrap();
    let b2 = docs_before.lookup("b2").unwrap();
    assert_eq!(
        harness
            .consolidator()
            .facet_documents(&harness.storage, COMMUNITY, 2)
            .unwrap(),
        BTreeSet::from([u, b1, b2])
    );
}

/// Consolidating a task scope merges only the windows inside it.
#[test]
fn test_consolidate_respects_task_scope() {
    let harness = TestHarness::new();
    let january = window((1, 1), (1, 7));
    let february = window((2, 1), (2, 7));
    let dir1 = harness.input_dir("jan");
    let dir2 = harness.input_dir("feb");
    write_story(&dir1, "a", day(1, 1), &STORM);
    write_story(&dir2, "f", day(2, 1), &STORM);
    harness.run_window(&dir1, january);
    harness.run_window(&dir2, february);

    let mut ctx = harness.open_session(CancellationToken::new());
    let mut runner = PipelineRunner::new(&mut ctx, &NoOpProgressCallback);
    let report = runner.consolidate(window((1, 1), (1, 31))).unwrap();
    assert_eq!(report.merged.keys().copied().collect::<Vec<_>>(), vec![january]);

    let report = runner.consolidate(Scope::AllDates).unwrap();
    assert_eq!(
        report.merged.keys().copied().collect::<Vec<_>>(),
        vec![january, february]
    );
    assert!(report.merged.values().all(|m| m.entries_added == 0));
}
