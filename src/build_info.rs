//! Build metadata injected by `build.rs`.

/// Package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit captured at build time.
pub const GIT_COMMIT: &str = env!("BUTLER_BUILD_GIT_HASH");

/// Build time as an HTTP date (UTC).
pub const BUILD_TIMESTAMP: &str = env!("BUTLER_BUILD_TIMESTAMP");

/// Trailer appended to `butler --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("BUTLER_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("BUTLER_BUILD_TIMESTAMP")
);

/// One-line banner shown when interactive mode starts.
pub fn startup_metadata_line() -> String {
    format!("v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_line_carries_version_commit_and_time() {
        let text = startup_metadata_line();
        assert!(text.starts_with('v'));
        assert!(text.contains(VERSION));
        assert!(text.contains(GIT_COMMIT));
        assert!(text.contains(BUILD_TIMESTAMP));
    }

    #[test]
    fn help_trailer_lists_commit_and_build_time() {
        assert!(HELP_BUILD_METADATA.contains("commit:"));
        assert!(HELP_BUILD_METADATA.contains("built:"));
    }
}
