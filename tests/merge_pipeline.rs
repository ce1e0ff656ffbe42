//! Merge-pipeline integration tests: fail-fast sequencing and rollback.

mod common;

use common::TestRepo;

const THREE_TASKS: &str = r#"[
    {"id": "t1"},
    {"id": "t2"},
    {"id": "t3"}
]"#;

/// Three tasks on disjoint files, each with one commit.
fn disjoint_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.write_tasks_file(THREE_TASKS);
    repo.braid_ok(&["setup", "tasks.json"]);
    for (task, file) in [("t1", "one.txt"), ("t2", "two.txt"), ("t3", "three.txt")] {
        repo.write_in_workspace(task, file, task);
        repo.commit_workspace(task, task);
    }
    repo
}

/// t1 and t2 both add `shared.txt` with different content; t3 stays clean.
fn conflicting_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.write_tasks_file(THREE_TASKS);
    repo.braid_ok(&["setup", "tasks.json"]);

    repo.write_in_workspace("t1", "shared.txt", "version one\n");
    repo.commit_workspace("t1", "t1: shared");
    repo.write_in_workspace("t2", "shared.txt", "version two\n");
    repo.commit_workspace("t2", "t2: shared");
    repo.write_in_workspace("t3", "solo.txt", "fine\n");
    repo.commit_workspace("t3", "t3: solo");
    repo
}

#[test]
fn clean_run_merges_everything_into_the_base_branch() {
    let repo = disjoint_repo();
    let report = repo.braid_json(&["merge", "--json"]);

    assert_eq!(report["target"], "main");
    assert_eq!(report["all_merged"], true);
    assert_eq!(report["completed"], 3);
    assert!(report["stopped_at"].is_null());
    for outcome in report["outcomes"].as_array().expect("outcomes") {
        assert_eq!(outcome["result"], "merged");
    }

    // The target working tree carries every task's file.
    assert!(repo.root().join("one.txt").exists());
    assert!(repo.root().join("two.txt").exists());
    assert!(repo.root().join("three.txt").exists());

    // The branch actually advanced past the base commit.
    let tip = repo.git(&["rev-parse", "main"]);
    assert_ne!(tip.trim(), repo.base());
    assert_eq!(
        report["final_commit"].as_str().expect("final commit"),
        tip.trim()
    );
}

#[test]
fn conflict_stops_the_run_and_rolls_the_target_back() {
    let repo = conflicting_repo();
    let (code, stdout, _) = repo.braid_code(&["merge", "--json"]);
    assert_eq!(code, 3, "a stopped run is a partial failure");
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("json report");

    // Order fronts the uncontested task: t3, then t1 (first to land
    // shared.txt), then t2 which conflicts with it.
    assert_eq!(report["completed"], 2);
    assert_eq!(report["stopped_at"], "t2");
    assert_eq!(report["all_merged"], false);
    let outcomes = report["outcomes"].as_array().expect("outcomes");
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[2]["result"], "conflicted");
    assert_eq!(outcomes[2]["files"], serde_json::json!(["shared.txt"]));

    // Rollback: the target ref is byte-identical to the base again, with no
    // trace of the merges that completed before the stop.
    let tip = repo.git(&["rev-parse", "main"]);
    assert_eq!(tip.trim(), repo.base());
    assert!(repo.git(&["diff", repo.base(), "main"]).is_empty());
    assert!(!repo.root().join("solo.txt").exists());
    assert!(!repo.root().join("shared.txt").exists());

    // No unmerged paths are left behind either.
    assert!(repo.git(&["diff", "--name-only", "--diff-filter=U"]).is_empty());
}

#[test]
fn conflict_is_recorded_and_resolve_explains_it() {
    let repo = conflicting_repo();
    let (code, _, _) = repo.braid_code(&["merge"]);
    assert_eq!(code, 3);

    let stdout = repo.braid_ok(&["resolve"]);
    assert!(stdout.contains("t2"), "resolve should name the stopping task:\n{stdout}");
    assert!(stdout.contains("shared.txt"));
    assert!(stdout.contains("rolled back"));
    assert!(stdout.contains("braid merge"));
}

#[test]
fn rerun_after_reconciling_completes() {
    let repo = conflicting_repo();
    let (code, _, _) = repo.braid_code(&["merge"]);
    assert_eq!(code, 3);

    // Reconcile on the t2 branch: adopt t1's content so the overlap merges.
    repo.write_in_workspace("t2", "shared.txt", "version one\n");
    repo.commit_workspace("t2", "t2: adopt t1 version");

    let report = repo.braid_json(&["merge", "--json"]);
    assert_eq!(report["all_merged"], true);
    assert_eq!(report["completed"], 3);
    assert!(repo.root().join("solo.txt").exists());
    assert_eq!(
        std::fs::read_to_string(repo.root().join("shared.txt")).expect("shared"),
        "version one\n"
    );
}

#[test]
fn dry_run_touches_nothing() {
    let repo = conflicting_repo();
    let report = repo.braid_json(&["merge", "--dry-run", "--json"]);

    assert_eq!(report["dry_run"], true);
    assert_eq!(report["order"][0], "t3");
    assert!(report["outcomes"].as_array().expect("outcomes").is_empty());

    let tip = repo.git(&["rev-parse", "main"]);
    assert_eq!(tip.trim(), repo.base());
    assert!(!repo.root().join("solo.txt").exists());
}

#[test]
fn merge_into_explicit_target_leaves_base_alone() {
    let repo = disjoint_repo();
    repo.git(&["branch", "integration", "main"]);

    let report = repo.braid_json(&["merge", "--target", "integration", "--json"]);
    assert_eq!(report["target"], "integration");
    assert_eq!(report["all_merged"], true);

    let base_tip = repo.git(&["rev-parse", "main"]);
    assert_eq!(base_tip.trim(), repo.base());
    let target_tip = repo.git(&["rev-parse", "integration"]);
    assert_ne!(target_tip.trim(), repo.base());
}

#[test]
fn conflict_resets_a_diverged_target_to_the_pinned_commit() {
    let repo = conflicting_repo();
    // An integration branch one commit ahead of the pinned base.
    let tree = repo.git(&["rev-parse", "main^{tree}"]);
    let extra = repo.git(&[
        "commit-tree",
        tree.trim(),
        "-p",
        repo.base(),
        "-m",
        "pre-run work",
    ]);
    repo.git(&["branch", "integration", extra.trim()]);

    let (code, _, stderr) = repo.braid_code(&["merge", "--target", "integration"]);
    assert_eq!(code, 3);
    // The divergence is called out before anything is touched.
    assert!(stderr.contains("pinned"), "stderr: {stderr}");
    assert!(stderr.contains("integration"), "stderr: {stderr}");

    // Rollback restores the pinned commit, not the diverged tip: the
    // pre-run commit on the override is gone.
    let tip = repo.git(&["rev-parse", "integration"]);
    assert_eq!(tip.trim(), repo.base());
}

#[test]
fn failing_verify_command_is_a_partial_failure() {
    let repo = disjoint_repo();
    repo.write_config("[merge]\nverify = [\"echo broken >&2; exit 7\"]\n");

    let (code, stdout, stderr) = repo.braid_code(&["merge", "--json"]);
    assert_eq!(code, 3);
    assert!(stderr.contains("exit code 7") || stderr.contains("broken"), "stderr: {stderr}");

    // The merge itself stands: verification gates the exit code, not the ref.
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("json report");
    assert_eq!(report["all_merged"], true);
    assert!(repo.root().join("one.txt").exists());
}

#[test]
fn passing_verify_commands_keep_exit_zero() {
    let repo = disjoint_repo();
    repo.write_config("[merge]\nverify = [\"test -f one.txt\", \"test -f two.txt\"]\n");
    let report = repo.braid_json(&["merge", "--json"]);
    assert_eq!(report["all_merged"], true);
}

#[test]
fn stale_lock_blocks_the_run() {
    let repo = disjoint_repo();
    std::fs::create_dir_all(repo.root().join(".braid")).expect("state dir");
    std::fs::write(repo.root().join(".braid").join("merge.lock"), "12345").expect("lock");

    let stderr = repo.braid_fails(&["merge"]);
    assert!(stderr.contains("merge.lock"), "stderr: {stderr}");

    // Target untouched.
    let tip = repo.git(&["rev-parse", "main"]);
    assert_eq!(tip.trim(), repo.base());
}

#[test]
fn merge_without_setup_exits_two() {
    let repo = TestRepo::new();
    let (code, _, _) = repo.braid_code(&["merge"]);
    assert_eq!(code, 2);
}
