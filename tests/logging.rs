// tests/logging.rs

use devloop::cli::LogLevel;
use devloop::logging::filter_directives;

#[test]
fn cli_flag_wins_over_the_environment() {
    assert_eq!(filter_directives(Some(LogLevel::Debug), Some("warn")), "debug");
    assert_eq!(filter_directives(Some(LogLevel::Error), None), "error");
}

#[test]
fn environment_directives_pass_through() {
    assert_eq!(
        filter_directives(None, Some(" info,devloop::vfs=debug,notify=warn ")),
        "info,devloop::vfs=debug,notify=warn"
    );
}

#[test]
fn defaults_to_info() {
    assert_eq!(filter_directives(None, None), "info");
    assert_eq!(filter_directives(None, Some("   ")), "info");
}
