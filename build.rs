//! Stamps the binary with its source revision and build time.
//!
//! `BUTLER_BUILD_GIT_HASH` / `BUTLER_BUILD_TIMESTAMP` override detection, and
//! `SOURCE_DATE_EPOCH` pins the time for reproducible builds. Outside a git
//! checkout the revision reads "unknown".

use std::process::Command;
use std::time::{Duration, SystemTime};

const REVISION_VAR: &str = "BUTLER_BUILD_GIT_HASH";
const BUILT_AT_VAR: &str = "BUTLER_BUILD_TIMESTAMP";
const EPOCH_VAR: &str = "SOURCE_DATE_EPOCH";

struct BuildStamp {
    revision: String,
    built_at: String,
}

impl BuildStamp {
    fn detect() -> Self {
        let revision = std::env::var(REVISION_VAR)
            .ok()
            .or_else(git_revision)
            .unwrap_or_else(|| "unknown".to_string());
        let built_at = std::env::var(BUILT_AT_VAR)
            .ok()
            .unwrap_or_else(|| httpdate::fmt_http_date(build_time()));
        Self { revision, built_at }
    }

    fn emit(&self) {
        println!("cargo:rustc-env={REVISION_VAR}={}", self.revision);
        println!("cargo:rustc-env={BUILT_AT_VAR}={}", self.built_at);
    }
}

fn main() {
    for var in [REVISION_VAR, BUILT_AT_VAR, EPOCH_VAR] {
        println!("cargo:rerun-if-env-changed={var}");
    }
    for path in git_watch_paths() {
        println!("cargo:rerun-if-changed={path}");
    }
    BuildStamp::detect().emit();
}

/// HEAD plus the branch it points at, so commits retrigger the script.
fn git_watch_paths() -> Vec<String> {
    let mut paths = vec![".git/HEAD".to_string()];
    if let Ok(head) = std::fs::read_to_string(".git/HEAD") {
        if let Some(branch) = head.trim().strip_prefix("ref: ") {
            paths.push(format!(".git/{branch}"));
        }
    }
    paths
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=12"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let revision = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!revision.is_empty()).then_some(revision)
}

fn build_time() -> SystemTime {
    std::env::var(EPOCH_VAR)
        .ok()
        .and_then(|secs| secs.trim().parse::<u64>().ok())
        .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap_or_else(SystemTime::now)
}
