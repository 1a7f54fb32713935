//! CLI help output specs.

use crate::prelude::*;

#[test]
fn drape_no_args_shows_usage_and_exits_nonzero() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn drape_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn drape_sessions_help_shows_usage() {
    cli().args(&["sessions", "--help"]).passes().stdout_has("Usage:");
}

#[test]
fn drape_usage_help_shows_usage() {
    cli().args(&["usage", "--help"]).passes().stdout_has("Usage:");
}
