//! Per-agent workspace isolation via git worktrees: one branch and working
//! directory per agent, all living under `<project_root>/.worktrees/`.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Repository, Signature, WorktreeAddOptions, WorktreePruneOptions};
use orch_core::WorkspaceRecord;
use tracing::{info, warn};

use crate::error::{Error, Result};

const WORKTREES_DIR: &str = ".worktrees";

/// Manages git worktrees for agent isolation, one per project checkout.
///
/// Holds only paths, not an open [`Repository`] handle: `git2::Repository`
/// is `Send` but not `Sync`, so keeping one alive as a field would make
/// `Arc<WorkspaceManager>` unusable across a multi-worker tokio runtime.
/// Each operation reopens the repository it needs instead.
pub struct WorkspaceManager {
    project_root: PathBuf,
    worktrees_dir: PathBuf,
}

impl WorkspaceManager {
    /// Open the repository at `project_root`, ensure the worktrees
    /// directory exists, and add it to `.gitignore` if not already present.
    pub fn open(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        // opened once just to validate this is actually a repository
        Repository::open(&project_root)?;
        let worktrees_dir = project_root.join(WORKTREES_DIR);

        fs::create_dir_all(&worktrees_dir).map_err(|source| Error::Io {
            path: worktrees_dir.clone(),
            source,
        })?;

        Self::ensure_gitignored(&project_root)?;

        Ok(Self {
            project_root,
            worktrees_dir,
        })
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.project_root)?)
    }

    fn ensure_gitignored(project_root: &Path) -> Result<()> {
        let gitignore_path = project_root.join(".gitignore");
        let entry = format!("{WORKTREES_DIR}/");

        let existing = fs::read_to_string(&gitignore_path).unwrap_or_default();
        if existing.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str("\n# Agent worktrees\n");
        updated.push_str(&entry);
        updated.push('\n');

        fs::write(&gitignore_path, updated).map_err(|source| Error::Io {
            path: gitignore_path,
            source,
        })
    }

    /// Create a worktree at `.worktrees/<branch_name>`, branching
    /// `branch_name` off `base_branch`. Removes a pre-existing worktree at
    /// that path first.
    pub fn create_workspace(&self, branch_name: &str, base_branch: &str) -> Result<WorkspaceRecord> {
        let worktree_path = self.worktrees_dir.join(branch_name);

        if worktree_path.exists() {
            warn!(branch_name, "worktree already exists, removing before recreate");
            self.remove_workspace(&worktree_path)?;
        }

        let repo = self.repo()?;
        let base_ref = repo
            .find_branch(base_branch, git2::BranchType::Local)
            .or_else(|_| repo.find_branch(base_branch, git2::BranchType::Remote))?;
        let base_commit = base_ref.get().peel_to_commit()?;

        let branch = repo.branch(branch_name, &base_commit, false)?;
        let branch_ref = branch.into_reference();

        let mut opts = WorktreeAddOptions::new();
        opts.reference(Some(&branch_ref));

        repo.worktree(branch_name, &worktree_path, Some(&opts))?;

        info!(branch_name, path = %worktree_path.display(), "created worktree");

        Ok(WorkspaceRecord {
            path: worktree_path,
            branch: branch_name.to_string(),
        })
    }

    /// Stage and commit all changes in the worktree. Returns the existing
    /// HEAD commit id unchanged if there is nothing to commit.
    ///
    /// `author` overrides the commit identity with `(name, email)`; when
    /// `None`, falls back to the repository's configured signature.
    pub fn commit_workspace(
        &self,
        workspace: &WorkspaceRecord,
        message: &str,
        author: Option<(&str, &str)>,
    ) -> Result<String> {
        let worktree_repo = Repository::open(&workspace.path)?;
        let mut index = worktree_repo.index()?;

        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let head_commit = worktree_repo.head()?.peel_to_commit()?;
        let tree_oid = index.write_tree()?;

        if tree_oid == head_commit.tree_id() {
            warn!(path = %workspace.path.display(), "no changes to commit");
            return Ok(head_commit.id().to_string());
        }

        let tree = worktree_repo.find_tree(tree_oid)?;
        let signature = match author {
            Some((name, email)) => Signature::now(name, email)?,
            None => worktree_repo
                .signature()
                .or_else(|_| Signature::now("orchestrator", "orchestrator@localhost"))?,
        };

        let commit_oid = worktree_repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&head_commit],
        )?;

        info!(path = %workspace.path.display(), commit = %commit_oid, "committed worktree changes");
        Ok(commit_oid.to_string())
    }

    /// Remove a worktree's administrative files and working directory.
    pub fn remove_workspace(&self, worktree_path: &Path) -> Result<()> {
        if !worktree_path.exists() {
            warn!(path = %worktree_path.display(), "worktree does not exist");
            return Ok(());
        }

        let name = worktree_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::UnknownBranch(worktree_path.display().to_string()))?;

        let repo = self.repo()?;
        if let Ok(worktree) = repo.find_worktree(name) {
            let mut opts = WorktreePruneOptions::new();
            opts.valid(true).locked(true).working_tree(true);
            worktree.prune(Some(&mut opts))?;
        }

        if worktree_path.exists() {
            fs::remove_dir_all(worktree_path).map_err(|source| Error::Io {
                path: worktree_path.to_path_buf(),
                source,
            })?;
        }

        info!(path = %worktree_path.display(), "removed worktree");
        Ok(())
    }

    /// List all worktrees registered against this repository.
    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRecord>> {
        let repo = self.repo()?;
        let mut records = Vec::new();
        for name in repo.worktrees()?.iter().flatten() {
            let worktree = repo.find_worktree(name)?;
            let path = worktree.path().to_path_buf();
            let branch = self.branch_of(&path).unwrap_or_else(|_| name.to_string());
            records.push(WorkspaceRecord { path, branch });
        }
        Ok(records)
    }

    /// The branch currently checked out in the worktree at `worktree_path`.
    pub fn branch_of(&self, worktree_path: &Path) -> Result<String> {
        let worktree_repo = Repository::open(worktree_path)?;
        let head = worktree_repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Delete a local branch. Fails if it is currently checked out (the
    /// repository's `HEAD`) unless `force` is set.
    pub fn delete_branch(&self, branch_name: &str, force: bool) -> Result<()> {
        let repo = self.repo()?;
        let mut branch = repo.find_branch(branch_name, git2::BranchType::Local)?;
        if force {
            branch.delete()?;
        } else {
            let is_head = branch.is_head();
            if is_head {
                return Err(Error::UnknownBranch(branch_name.to_string()));
            }
            branch.delete()?;
        }
        info!(branch_name, "deleted branch");
        Ok(())
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Where [`Self::create_workspace`] would place a worktree for
    /// `branch_name`, without requiring one to already exist.
    #[must_use]
    pub fn worktree_path(&self, branch_name: &str) -> std::path::PathBuf {
        self.worktrees_dir.join(branch_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .status()
                .expect("git binary available");
            assert!(status.success(), "git {args:?} failed");
        };

        run(&["init", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-m", "initial"]);
    }

    #[test]
    fn create_and_remove_workspace_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let manager = WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = manager.create_workspace("agent-1", "main").unwrap();
        assert!(workspace.path.exists());
        assert_eq!(manager.branch_of(&workspace.path).unwrap(), "agent-1");

        manager.remove_workspace(&workspace.path).unwrap();
        assert!(!workspace.path.exists());
    }

    #[test]
    fn gitignore_gets_worktrees_entry_once() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        WorkspaceManager::open(tmp.path()).unwrap();
        WorkspaceManager::open(tmp.path()).unwrap();

        let content = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(".worktrees/").count(), 1);
    }

    #[test]
    fn commit_workspace_returns_head_unchanged_when_nothing_to_commit() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let manager = WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = manager.create_workspace("agent-2", "main").unwrap();

        let head_before = Repository::open(&workspace.path)
            .unwrap()
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string();

        let commit = manager.commit_workspace(&workspace, "no-op", None).unwrap();
        assert_eq!(commit, head_before);
    }
}
