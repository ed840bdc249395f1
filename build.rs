// Embeds build metadata (git branch, commit, build time) into the binary
// as rustc env vars consumed by the startup banner.
//
// Resolution order: CI variables, then the git CLI, then .git/HEAD.

use std::{env, fs, path::Path, process::Command, time::SystemTime};

fn main() {
    let now = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();
    println!("cargo:rustc-env=BUILD_TIME={}", now);

    println!("cargo:rerun-if-changed=.git/HEAD");
    if Path::new(".git/refs/heads").exists() {
        println!("cargo:rerun-if-changed=.git/refs/heads");
    }

    let (branch, commit) = git_info();
    let commit_short = if commit.len() >= 7 {
        commit[..7].to_string()
    } else {
        commit.clone()
    };

    println!("cargo:rustc-env=GIT_BRANCH={}", branch);
    println!("cargo:rustc-env=GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=GIT_COMMIT_SHORT={}", commit_short);
}

fn git_info() -> (String, String) {
    let mut branch = env::var("GITHUB_REF_NAME").unwrap_or_else(|_| "unknown".to_string());
    let mut commit = env::var("GITHUB_SHA").unwrap_or_else(|_| "unknown".to_string());

    if branch == "unknown" {
        if let Ok(output) = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .output()
        {
            if output.status.success() {
                branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
        }
    }

    if commit == "unknown" {
        if let Ok(output) = Command::new("git").args(["rev-parse", "HEAD"]).output() {
            if output.status.success() {
                commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
        }
    }

    // No git CLI available: read the ref files directly.
    if commit == "unknown" || branch == "unknown" {
        if let Ok(head) = fs::read_to_string(".git/HEAD") {
            if head.starts_with("ref: ") {
                let ref_path = head.trim_start_matches("ref: ").trim();
                branch = ref_path
                    .split('/')
                    .next_back()
                    .unwrap_or("unknown")
                    .to_string();
                if let Ok(c) = fs::read_to_string(format!(".git/{}", ref_path)) {
                    commit = c.trim().to_string();
                }
            } else {
                commit = head.trim().to_string();
            }
        }
    }

    (branch, commit)
}
