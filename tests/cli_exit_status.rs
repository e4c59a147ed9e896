// SPDX-License-Identifier: AGPL-3.0-or-later

//! Exit status of `sonarsnap compare` under its failure flags

mod common {
    use std::path::PathBuf;
    use std::process::Command;

    pub fn fixtures_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/snapshots")
    }

    /// Run `sonarsnap compare` against the fixture directory
    pub fn compare(from: &str, to: &str, flags: &[&str]) -> Option<i32> {
        let output = Command::new(env!("CARGO_BIN_EXE_sonarsnap"))
            .env_remove("SONARSNAP_DIR")
            .arg("--dir")
            .arg(fixtures_path())
            .args(["--format", "json", "compare", from, to])
            .args(flags)
            .output()
            .expect("Should run the sonarsnap binary");
        output.status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::common;

    #[test]
    fn test_regression_passes_without_flag() {
        assert_eq!(common::compare("before", "after", &[]), Some(0));
    }

    #[test]
    fn test_fail_on_regression() {
        assert_eq!(common::compare("before", "after", &["--fail-on-regression"]), Some(1));
        assert_eq!(common::compare("after", "after", &["--fail-on-regression"]), Some(0));
    }

    #[test]
    fn test_strict_fails_on_unparseable_values() {
        assert_eq!(common::compare("before", "bad-values", &[]), Some(0));
        assert_eq!(common::compare("before", "bad-values", &["--strict"]), Some(1));
        assert_eq!(common::compare("before", "after", &["--strict"]), Some(0));
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        assert_eq!(common::compare("before", "no-such-snapshot", &[]), Some(1));
    }
}
