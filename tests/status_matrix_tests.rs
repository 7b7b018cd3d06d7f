//! End-to-end status matrix coverage: every tracking state a repository can
//! reach is scripted with real git commands and checked against both the
//! raw tuple the engine reports and the classified status.

use git_bridge::{classify, GitFileStatus, GitEngine, LocalEngine, StatusRow};

mod common;
use common::repository::*;

fn single_row(engine: &LocalEngine, path: &str) -> StatusRow {
    let rows = engine.status_matrix().expect("status matrix");
    rows.into_iter()
        .find(|r| r.path == path)
        .unwrap_or_else(|| panic!("no status row for {path}"))
}

fn assert_state(repo: &TestRepo, path: &str, tuple: (u8, u8, u8), expected: GitFileStatus) {
    let engine = LocalEngine::at(repo.path());
    let row = single_row(&engine, path);
    assert_eq!(
        (row.head, row.worktree, row.stage),
        tuple,
        "tuple for {path}"
    );
    assert_eq!(classify(&row).unwrap(), expected);
}

#[test]
fn test_untracked_file() -> anyhow::Result<()> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "new.txt", "content")?;
    assert_state(&repo, "new.txt", (0, 2, 0), GitFileStatus::Untracked);
    Ok(())
}

#[test]
fn test_added_file() -> anyhow::Result<()> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "new.txt", "content")?;
    git(&repo.path, &["add", "new.txt"]);
    assert_state(&repo, "new.txt", (0, 2, 2), GitFileStatus::Added);
    Ok(())
}

#[test]
fn test_added_then_modified() -> anyhow::Result<()> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "new.txt", "content")?;
    git(&repo.path, &["add", "new.txt"]);
    create_file(&repo.path, "new.txt", "changed")?;
    assert_state(&repo, "new.txt", (0, 2, 3), GitFileStatus::AddedModified);
    Ok(())
}

#[test]
fn test_added_then_deleted() -> anyhow::Result<()> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "new.txt", "content")?;
    git(&repo.path, &["add", "new.txt"]);
    remove_file(&repo.path, "new.txt")?;
    assert_state(&repo, "new.txt", (0, 0, 3), GitFileStatus::AddedDeleted);
    Ok(())
}

#[test]
fn test_unmodified_file() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    assert_state(&repo, "tracked.txt", (1, 1, 1), GitFileStatus::Unmodified);
    Ok(())
}

#[test]
fn test_modified_unstaged() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    create_file(&repo.path, "tracked.txt", "edited\n")?;
    assert_state(
        &repo,
        "tracked.txt",
        (1, 2, 1),
        GitFileStatus::ModifiedUnstaged,
    );
    Ok(())
}

#[test]
fn test_modified_staged() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    create_file(&repo.path, "tracked.txt", "edited\n")?;
    git(&repo.path, &["add", "tracked.txt"]);
    assert_state(
        &repo,
        "tracked.txt",
        (1, 2, 2),
        GitFileStatus::ModifiedStaged,
    );
    Ok(())
}

#[test]
fn test_modified_staged_then_modified_again() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    create_file(&repo.path, "tracked.txt", "edited\n")?;
    git(&repo.path, &["add", "tracked.txt"]);
    create_file(&repo.path, "tracked.txt", "edited twice\n")?;
    assert_state(
        &repo,
        "tracked.txt",
        (1, 2, 3),
        GitFileStatus::ModifiedStagedUnstaged,
    );
    Ok(())
}

#[test]
fn test_deleted_unstaged() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    remove_file(&repo.path, "tracked.txt")?;
    assert_state(
        &repo,
        "tracked.txt",
        (1, 0, 1),
        GitFileStatus::DeletedUnstaged,
    );
    Ok(())
}

#[test]
fn test_deleted_staged() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    git(&repo.path, &["rm", "tracked.txt"]);
    assert_state(
        &repo,
        "tracked.txt",
        (1, 0, 0),
        GitFileStatus::DeletedStaged,
    );
    Ok(())
}

#[test]
fn test_deleted_with_identical_untracked_file() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    // Remove from the index only; the identical file stays on disk
    git(&repo.path, &["rm", "--cached", "tracked.txt"]);
    assert_state(
        &repo,
        "tracked.txt",
        (1, 1, 0),
        GitFileStatus::DeletedUntracked,
    );
    Ok(())
}

#[test]
fn test_deleted_then_recreated_with_new_content() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    git(&repo.path, &["rm", "--cached", "tracked.txt"]);
    create_file(&repo.path, "tracked.txt", "different content\n")?;
    assert_state(
        &repo,
        "tracked.txt",
        (1, 2, 0),
        GitFileStatus::DeletedModified,
    );
    Ok(())
}

#[test]
fn test_modified_staged_then_deleted() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    create_file(&repo.path, "tracked.txt", "edited\n")?;
    git(&repo.path, &["add", "tracked.txt"]);
    remove_file(&repo.path, "tracked.txt")?;
    assert_state(
        &repo,
        "tracked.txt",
        (1, 0, 3),
        GitFileStatus::ModifiedDeleted,
    );
    Ok(())
}

#[test]
fn test_matrix_is_recomputed_per_call() -> anyhow::Result<()> {
    let repo = setup_repo_with_commit()?;
    let engine = LocalEngine::at(repo.path());

    let before = single_row(&engine, "tracked.txt");
    assert_eq!((before.head, before.worktree, before.stage), (1, 1, 1));

    create_file(&repo.path, "tracked.txt", "edited\n")?;
    let after = single_row(&engine, "tracked.txt");
    assert_eq!((after.head, after.worktree, after.stage), (1, 2, 1));
    Ok(())
}

#[test]
fn test_mixed_repository_classifies_every_row() -> anyhow::Result<()> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "committed.txt", "a\n")?;
    create_file(&repo.path, "staged.txt", "b\n")?;
    git(&repo.path, &["add", "."]);
    git(&repo.path, &["commit", "-m", "base"]);

    create_file(&repo.path, "committed.txt", "a changed\n")?;
    create_file(&repo.path, "untracked.txt", "c\n")?;

    let engine = LocalEngine::at(repo.path());
    let rows = engine.status_matrix()?;
    assert_eq!(rows.len(), 3);
    for row in &rows {
        classify(row)?;
    }
    Ok(())
}
