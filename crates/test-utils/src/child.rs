//! Re-running the current test binary as a child process.
//!
//! A test that needs a real helper process spawns its own binary with
//! [`only_test`] arguments and [`CHILD_ROLE_ENV`] set. The named test checks
//! [`child_role`] and plays the helper; in a normal run it returns at once.

use std::path::PathBuf;

/// Selects the helper a re-invoked test binary plays.
pub const CHILD_ROLE_ENV: &str = "DEVLOOP_TEST_CHILD_ROLE";

/// Role this process was started with, if it is a helper.
pub fn child_role() -> Option<String> {
    std::env::var(CHILD_ROLE_ENV).ok()
}

/// Path of the running test binary.
pub fn test_binary() -> PathBuf {
    std::env::current_exe().expect("test binary path")
}

/// libtest arguments that run exactly one test.
pub fn only_test(name: &str) -> Vec<String> {
    vec![
        name.to_string(),
        "--exact".to_string(),
        "--nocapture".to_string(),
        "--test-threads=1".to_string(),
    ]
}
