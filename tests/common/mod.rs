//! Braid test infrastructure.
#![allow(dead_code)]
//!
//! Provides [`TestRepo`], a self-contained git repository in a temporary
//! directory for integration tests. Each `TestRepo` gets a unique temp dir,
//! runs real git commands, and cleans up on drop.
//!
//! # Design principles
//!
//! - **Git-native**: worktrees and branches come from real git, matching the
//!   binary's own backend.
//! - **Parallel-safe**: each `TestRepo` lives in its own `TempDir`.
//! - **Drop-safe**: temp dirs are deleted when `TestRepo` goes out of scope.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

// ---------------------------------------------------------------------------
// TestRepo
// ---------------------------------------------------------------------------

/// A self-contained git repository in a temporary directory.
pub struct TestRepo {
    /// The temp dir — held to prevent premature cleanup.
    _dir: TempDir,
    /// Absolute path to the repo root (same as `_dir.path()`).
    root: PathBuf,
    /// The initial commit OID on `main`.
    base: String,
}

impl TestRepo {
    /// Create a new test repo with one seed commit on `main`.
    ///
    /// # Panics
    /// Panics if any git command fails.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().to_path_buf();

        git_ok(&root, &["init"]);

        // Configure identity for commits
        git_ok(&root, &["config", "user.name", "Test"]);
        git_ok(&root, &["config", "user.email", "test@localhost"]);

        // Disable signing
        git_ok(&root, &["config", "commit.gpgsign", "false"]);
        git_ok(&root, &["config", "tag.gpgsign", "false"]);

        // Ensure we're on `main`, with one real commit to descend from
        git_ok(&root, &["checkout", "-B", "main"]);
        std::fs::write(root.join("README.md"), "# test repo\n").expect("write README");
        git_ok(&root, &["add", "README.md"]);
        git_ok(&root, &["commit", "-m", "initial"]);

        let base = git_ok(&root, &["rev-parse", "HEAD"]).trim().to_owned();

        Self {
            _dir: dir,
            root,
            base,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Absolute path to the repo root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The seed commit OID (40-char hex).
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute path to a task workspace: `<root>/ws/<task-id>/`.
    #[must_use]
    pub fn workspace_path(&self, task: &str) -> PathBuf {
        self.root.join("ws").join(task)
    }

    // -----------------------------------------------------------------------
    // Fixture helpers
    // -----------------------------------------------------------------------

    /// Write a tasks file at `<root>/tasks.json` and return its path.
    pub fn write_tasks_file(&self, json: &str) -> PathBuf {
        let path = self.root.join("tasks.json");
        std::fs::write(&path, json).expect("write tasks file");
        path
    }

    /// Write `.braid.toml` at the repo root.
    pub fn write_config(&self, toml: &str) {
        std::fs::write(self.root.join(".braid.toml"), toml).expect("write config");
    }

    /// Write a file inside a task workspace, creating parent dirs as needed.
    ///
    /// # Panics
    /// Panics if the workspace doesn't exist or the write fails.
    pub fn write_in_workspace(&self, task: &str, rel_path: &str, content: &str) {
        let ws_path = self.workspace_path(task);
        assert!(
            ws_path.exists(),
            "workspace '{}' does not exist at {}",
            task,
            ws_path.display()
        );
        let file_path = ws_path.join(rel_path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("failed to create dirs for {}: {e}", file_path.display()));
        }
        std::fs::write(&file_path, content)
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", file_path.display()));
    }

    /// Stage and commit everything in a task workspace.
    pub fn commit_workspace(&self, task: &str, message: &str) {
        let ws_path = self.workspace_path(task);
        git_ok(&ws_path, &["add", "-A"]);
        git_ok(&ws_path, &["commit", "-m", message]);
    }

    /// Write the done marker into a task workspace.
    pub fn mark_done(&self, task: &str, note: &str) {
        self.write_in_workspace(task, ".braid-done", note);
    }

    /// Write the failed marker into a task workspace.
    pub fn mark_failed(&self, task: &str, note: &str) {
        self.write_in_workspace(task, ".braid-failed", note);
    }

    // -----------------------------------------------------------------------
    // braid CLI helpers
    // -----------------------------------------------------------------------

    /// Run the `braid` binary with arguments, using the repo root as cwd.
    ///
    /// Returns the raw `Output`.
    pub fn braid_raw(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_braid"))
            .args(args)
            .current_dir(&self.root)
            .output()
            .expect("failed to execute braid")
    }

    /// Run `braid` and assert it exits 0. Returns stdout as a string.
    ///
    /// # Panics
    /// Panics with stdout + stderr if the command fails.
    pub fn braid_ok(&self, args: &[&str]) -> String {
        let out = self.braid_raw(args);
        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(
            out.status.success(),
            "braid {} failed:\nstdout: {stdout}\nstderr: {stderr}",
            args.join(" "),
        );
        stdout.to_string()
    }

    /// Run `braid` and assert it fails. Returns stderr as a string.
    ///
    /// # Panics
    /// Panics if the command succeeds.
    pub fn braid_fails(&self, args: &[&str]) -> String {
        let out = self.braid_raw(args);
        assert!(
            !out.status.success(),
            "Expected braid {} to fail, but it succeeded.\nstdout: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stdout),
        );
        String::from_utf8_lossy(&out.stderr).to_string()
    }

    /// Run `braid` and return `(exit_code, stdout, stderr)`.
    pub fn braid_code(&self, args: &[&str]) -> (i32, String, String) {
        let out = self.braid_raw(args);
        (
            out.status.code().expect("braid terminated by signal"),
            String::from_utf8_lossy(&out.stdout).to_string(),
            String::from_utf8_lossy(&out.stderr).to_string(),
        )
    }

    /// Run `braid` expecting JSON output on stdout; parse it.
    pub fn braid_json(&self, args: &[&str]) -> serde_json::Value {
        let stdout = self.braid_ok(args);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("braid {} produced invalid JSON: {e}\n{stdout}", args.join(" ")))
    }

    // -----------------------------------------------------------------------
    // Git command helpers
    // -----------------------------------------------------------------------

    /// Run a git command in the repo root. Panics on failure.
    pub fn git(&self, args: &[&str]) -> String {
        git_ok(&self.root, args)
    }

    /// Whether a local branch exists.
    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{name}")])
            .current_dir(&self.root)
            .output()
            .expect("failed to run git")
            .status
            .success()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Free-standing git helpers
// ---------------------------------------------------------------------------

/// Run a git command in the given directory and return stdout.
///
/// # Panics
/// Panics with stderr if the command fails.
pub fn git_ok(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "git {} failed in {}:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
        dir.display(),
    );
    stdout.to_string()
}
