/// Build information captured at compile time by `build.rs`
pub struct BuildInfo;

impl BuildInfo {
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Build timestamp in YYYYMMDD.HHMMSS format
    pub fn build_timestamp() -> &'static str {
        env!("BUILD_TIMESTAMP")
    }

    /// Short git commit hash (first 7 characters), or "unknown"
    pub fn git_hash_short() -> &'static str {
        env!("GIT_HASH_SHORT")
    }

    /// Target platform (arch-os)
    pub fn target_platform() -> &'static str {
        env!("TARGET_PLATFORM")
    }

    pub fn build_profile() -> &'static str {
        env!("BUILD_PROFILE")
    }

    pub fn display_version() -> String {
        format!("{} ({})", Self::version(), Self::build_timestamp())
    }

    /// One-line build identity logged when the CLI starts, e.g. `detscope 0.1.0 (a1b2c3d, debug)`
    pub fn summary_line() -> String {
        format!(
            "{} {} ({}, {})",
            crate::config::APP_NAME,
            Self::version(),
            Self::git_hash_short(),
            Self::build_profile()
        )
    }

    /// Multi-line summary printed by `detscope version`
    pub fn detailed_info() -> String {
        format!(
            "Version: {}\nBuild: {}\nCommit: {}\nPlatform: {}\nProfile: {}",
            Self::version(),
            Self::build_timestamp(),
            Self::git_hash_short(),
            Self::target_platform(),
            Self::build_profile()
        )
    }
}
