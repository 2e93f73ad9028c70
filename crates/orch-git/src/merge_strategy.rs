//! Low-level git merge mechanics: conflict detection and branch merging.
//!
//! Mirrors what `git merge` / `git merge --abort` do, built on libgit2
//! instead of shelling out to the `git` binary.

use std::path::PathBuf;

use git2::{CheckoutBuilder, Commit, MergeOptions, Repository, Signature, Tree};

use crate::error::Result;

/// Outcome of attempting to merge one branch into another.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// Target was already up to date with source; no commit created.
    UpToDate,
    /// Target's ref was simply advanced to source's tip.
    FastForward { commit_id: String },
    /// A merge commit was created.
    Merged { commit_id: String },
    /// Merge left conflicts; the repository is left with an in-progress
    /// merge. Call [`MergeStrategy::abort_merge`] to clean up.
    Conflicted { files: Vec<String> },
}

/// Git-level merge mechanics, operating on the project's primary checkout
/// (never a worker's worktree).
///
/// Holds only a path, for the same reason as [`crate::WorkspaceManager`]:
/// a `Repository` handle is `Send` but not `Sync`, so an open one can't
/// sit in a field behind an `Arc` shared across tokio tasks.
pub struct MergeStrategy {
    project_root: PathBuf,
}

impl MergeStrategy {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.project_root)?)
    }

    /// Merge-base commit id between two branches.
    pub fn merge_base(&self, branch_a: &str, branch_b: &str) -> Result<String> {
        let repo = self.repo()?;
        let a = branch_commit(&repo, branch_a)?;
        let b = branch_commit(&repo, branch_b)?;
        Ok(repo.merge_base(a.id(), b.id())?.to_string())
    }

    /// Files that differ between two branch tips.
    pub fn diff_files(&self, branch_a: &str, branch_b: &str) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let tree_a = branch_commit(&repo, branch_a)?.tree()?;
        let tree_b = branch_commit(&repo, branch_b)?.tree()?;
        diff_paths(&repo, &tree_a, &tree_b)
    }

    /// Files changed in `branch` since it diverged from `base_branch`.
    pub fn changed_files(&self, branch: &str, base_branch: &str) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let base_oid = {
            let a = branch_commit(&repo, branch)?;
            let b = branch_commit(&repo, base_branch)?;
            repo.merge_base(a.id(), b.id())?
        };
        let base_tree = repo.find_commit(base_oid)?.tree()?;
        let branch_tree = branch_commit(&repo, branch)?.tree()?;
        diff_paths(&repo, &base_tree, &branch_tree)
    }

    /// Whether `file_path` was also touched on `target_branch` since
    /// `agent_branch` diverged from it, i.e. whether the two branches have
    /// concurrent edits to the same file.
    pub fn has_diverged(&self, file_path: &str, agent_branch: &str, target_branch: &str) -> Result<bool> {
        let changed = self.changed_files(target_branch, agent_branch)?;
        Ok(changed.iter().any(|f| f == file_path))
    }

    /// Whether the repository currently has an unresolved merge in progress.
    pub fn has_conflicts(&self) -> Result<bool> {
        let repo = self.repo()?;
        Ok(repo.index()?.has_conflicts())
    }

    /// Merge `source_branch` into `target_branch`, leaving `target_branch`
    /// checked out. Never touches the source branch.
    pub fn merge_branch(&self, source_branch: &str, target_branch: &str, message: &str) -> Result<MergeOutcome> {
        let repo = self.repo()?;
        checkout_branch(&repo, target_branch)?;

        let source_commit = branch_commit(&repo, source_branch)?;
        let annotated = repo.find_annotated_commit(source_commit.id())?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::UpToDate);
        }

        if analysis.is_fast_forward() {
            let refname = format!("refs/heads/{target_branch}");
            let mut target_ref = repo.find_reference(&refname)?;
            target_ref.set_target(source_commit.id(), "fast-forward merge")?;
            repo.set_head(&refname)?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            return Ok(MergeOutcome::FastForward {
                commit_id: source_commit.id().to_string(),
            });
        }

        let mut merge_opts = MergeOptions::new();
        merge_opts.fail_on_conflict(false);
        repo.merge(&[&annotated], Some(&mut merge_opts), Some(CheckoutBuilder::new().force()))?;

        let mut index = repo.index()?;
        if index.has_conflicts() {
            let mut files = Vec::new();
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                    files.push(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
            files.sort();
            files.dedup();
            return Ok(MergeOutcome::Conflicted { files });
        }

        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let head_commit = repo.head()?.peel_to_commit()?;
        let signature = repo
            .signature()
            .or_else(|_| Signature::now("orchestrator", "orchestrator@localhost"))?;

        let commit_oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&head_commit, &source_commit],
        )?;

        repo.cleanup_state()?;
        Ok(MergeOutcome::Merged {
            commit_id: commit_oid.to_string(),
        })
    }

    /// Abort an in-progress merge, resetting the working tree back to HEAD.
    pub fn abort_merge(&self) -> Result<()> {
        let repo = self.repo()?;
        let head_commit = repo.head()?.peel_to_commit()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.reset(head_commit.as_object(), git2::ResetType::Hard, Some(&mut checkout))?;
        repo.cleanup_state()?;
        Ok(())
    }
}

fn branch_commit<'repo>(repo: &'repo Repository, branch: &str) -> Result<Commit<'repo>> {
    let reference = repo
        .find_branch(branch, git2::BranchType::Local)
        .or_else(|_| repo.find_branch(branch, git2::BranchType::Remote))?
        .into_reference();
    Ok(reference.peel_to_commit()?)
}

fn checkout_branch(repo: &Repository, branch: &str) -> Result<()> {
    let commit = branch_commit(repo, branch)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head(&format!("refs/heads/{branch}"))?;
    Ok(())
}

fn diff_paths(repo: &Repository, tree_a: &Tree, tree_b: &Tree) -> Result<Vec<String>> {
    let diff = repo.diff_tree_to_tree(Some(tree_a), Some(tree_b), None)?;
    let mut files = Vec::new();
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
            files.push(path.display().to_string());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
