mod support;

use gitsave::commit::build_commit;
use gitsave::config::Config;
use gitsave::merge::{self, ChangeStatus, LineOrigin};
use gitsave::{EntryMetadata, Error, Workspace};

use support::{read_string, save_files, TestStore, AUTHOR};

/// Build a commit on `base` without moving the mainline.
fn candidate(
    ws: &Workspace,
    base: git2::Oid,
    files: &[(&str, &str)],
    message: &str,
) -> gitsave::Result<git2::Oid> {
    let mut staging = ws.staging(Some(base))?;
    for (path, content) in files {
        staging.add(path, content.as_bytes(), EntryMetadata::default())?;
    }
    build_commit(ws, staging, message)
}

#[test]
fn conflicting_candidate_is_reported_and_mainline_kept() -> Result<(), Box<dyn std::error::Error>>
{
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("a.txt", "base\n")], "base")?.tip;

    let winner = save_files(&ws, &[("a.txt", "alpha\n")], "alpha")?.tip;
    let loser = candidate(&ws, base, &[("a.txt", "beta\n")], "beta")?;

    let report = match merge::merge(&ws, loser, false) {
        Err(Error::GitConflicts(report)) => report,
        other => panic!("expected conflicts, got {other:?}"),
    };

    assert_eq!(report.paths(), vec!["a.txt"]);
    let file = report.get("a.txt").ok_or("a.txt in report")?;
    assert_eq!(file.status, ChangeStatus::Modified);
    assert!(file
        .lines
        .iter()
        .any(|line| line.origin == LineOrigin::Removed && line.content == "beta"));
    assert!(file
        .lines
        .iter()
        .any(|line| line.origin == LineOrigin::Added && line.content == "alpha"));

    assert_eq!(ws.mainline_tip()?, Some(winner));
    assert_eq!(read_string(&ws, "a.txt")?, "alpha\n");
    Ok(())
}

#[test]
fn conflicting_rebase_leaves_mainline_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("a.txt", "base\n")], "base")?.tip;
    let winner = save_files(&ws, &[("a.txt", "alpha\n")], "alpha")?.tip;
    let loser = candidate(&ws, base, &[("a.txt", "beta\n")], "beta")?;

    let err = merge::merge(&ws, loser, true).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(ws.mainline_tip()?, Some(winner));
    Ok(())
}

#[test]
fn diverged_candidates_merge_into_union() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("shared.txt", "s")], "base")?.tip;
    let first = save_files(&ws, &[("x.txt", "x")], "x")?.tip;
    let second = candidate(&ws, base, &[("y.txt", "y")], "y")?;

    let tip = merge::merge(&ws, second, false)?;

    let commit = ws.repo().find_commit(tip)?;
    assert_eq!(commit.parent_ids().collect::<Vec<_>>(), vec![first, second]);
    assert!(commit.message().unwrap_or_default().starts_with("Merge "));
    assert_eq!(
        ws.file_list(None)?,
        vec![
            "shared.txt".to_string(),
            "x.txt".to_string(),
            "y.txt".to_string()
        ]
    );
    Ok(())
}

#[test]
fn linear_rewrite_reparents_onto_tip() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("shared.txt", "s")], "base")?.tip;
    let first = save_files(&ws, &[("x.txt", "x")], "x")?.tip;
    let second = candidate(&ws, base, &[("y.txt", "y")], "add y")?;

    let tip = merge::merge(&ws, second, true)?;

    assert_ne!(tip, second);
    let rewritten = ws.repo().find_commit(tip)?;
    let original = ws.repo().find_commit(second)?;
    assert_eq!(rewritten.parent_ids().collect::<Vec<_>>(), vec![first]);
    assert_eq!(rewritten.message(), original.message());
    assert_eq!(rewritten.author().email(), original.author().email());
    assert_eq!(read_string(&ws, "x.txt")?, "x");
    assert_eq!(read_string(&ws, "y.txt")?, "y");
    Ok(())
}

#[test]
fn linear_rewrite_keeps_a_child_of_the_tip() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("a.txt", "a")], "base")?.tip;
    let next = candidate(&ws, base, &[("b.txt", "b")], "b")?;

    assert_eq!(merge::merge(&ws, next, true)?, next);
    assert_eq!(ws.mainline_tip()?, Some(next));
    Ok(())
}

#[test]
fn descendant_fast_forwards_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("a.txt", "a")], "base")?.tip;
    let next = candidate(&ws, base, &[("b.txt", "b")], "b")?;

    assert_eq!(merge::merge(&ws, next, false)?, next);
    Ok(())
}

#[test]
fn fast_forward_can_be_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let config = Config {
        fast_forward: false,
        ..Config::default()
    };
    let ws = Workspace::with_config(store.repo()?, config, Some(AUTHOR))?;
    let base = save_files(&ws, &[("a.txt", "a")], "base")?.tip;
    let next = candidate(&ws, base, &[("b.txt", "b")], "b")?;

    let tip = merge::merge(&ws, next, false)?;

    assert_ne!(tip, next);
    let commit = ws.repo().find_commit(tip)?;
    assert_eq!(commit.parent_ids().collect::<Vec<_>>(), vec![base, next]);
    Ok(())
}

#[test]
fn merged_candidate_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let base = save_files(&ws, &[("a.txt", "a")], "base")?.tip;
    let tip = save_files(&ws, &[("b.txt", "b")], "b")?.tip;

    assert_eq!(merge::merge(&ws, base, false)?, tip);
    assert_eq!(merge::merge(&ws, tip, true)?, tip);
    assert_eq!(ws.mainline_tip()?, Some(tip));
    Ok(())
}

#[test]
fn first_merge_creates_the_mainline() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    let staging = ws.staging(None)?;
    let commit = build_commit(&ws, staging, "empty")?;

    assert_eq!(ws.repo().find_commit(commit)?.parent_count(), 0);
    assert_eq!(merge::merge(&ws, commit, true)?, commit);
    assert_eq!(ws.mainline_tip()?, Some(commit));
    Ok(())
}

#[test]
fn unrelated_histories_merge_against_empty_ancestor() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::init()?;
    let ws = store.open()?;
    save_files(&ws, &[("a.txt", "a")], "base")?;

    let repo = ws.repo();
    let mut staging = gitsave::StagingIndex::new(repo, None)?;
    staging.add("orphan.txt", b"o", EntryMetadata::default())?;
    let tree = repo.find_tree(staging.write_tree()?)?;
    let sig = ws.identity().signature()?;
    let orphan = repo.commit(None, &sig, &sig, "orphan", &tree, &[])?;

    merge::merge(&ws, orphan, false)?;

    assert_eq!(
        ws.file_list(None)?,
        vec!["a.txt".to_string(), "orphan.txt".to_string()]
    );
    Ok(())
}
