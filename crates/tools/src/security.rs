// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security deny-list for `run_command` (spec.md §4.8). A rejection is
//! returned as a [`crate::errors::ToolError::DeniedCommand`] — an error
//! `ToolResult` the model sees and can react to, never a transport failure.

use std::sync::LazyLock;

use regex::Regex;

/// `rm` with a force flag targeting anything outside the project directory.
static RM_OUTSIDE_PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brm\b[^\n]*\s-[a-z]*f[a-z]*\s+(?:[^\n]*\s)?(?:/(?!home/coder/project)\S*|~\S*|\.\./\S*)")
        .expect("rm-outside-project pattern is valid")
});

/// A pipe from `curl`/`wget` straight into a shell.
static PIPE_TO_SHELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(sh|bash|zsh)\b").expect("pipe-to-shell pattern is valid"));

/// Redirection into `/etc/`.
static REDIRECT_INTO_ETC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">>?\s*/etc/\S*").expect("redirect-into-etc pattern is valid"));

/// `curl -d` whose payload contains command substitution.
static CURL_DATA_COMMAND_SUBSTITUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bcurl\b[^\n]*-d\s*['"]?[^'"\n]*(\$\(|`)"#).expect("curl-command-substitution pattern is valid")
});

/// The AWS instance-metadata address.
static AWS_METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"169\.254\.169\.254").expect("aws-metadata pattern is valid"));

/// Writes into `/proc/` or `/sys/`.
static WRITE_INTO_PROC_OR_SYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">>?\s*/(proc|sys)/\S*").expect("write-into-proc-or-sys pattern is valid"));

/// Check `command` against every deny rule, returning the first rejection
/// reason if any matches.
pub fn check(command: &str) -> Result<(), &'static str> {
    if RM_OUTSIDE_PROJECT.is_match(command) {
        return Err("rm -f targeting a path outside /home/coder/project");
    }
    if PIPE_TO_SHELL.is_match(command) {
        return Err("piping a remote download directly into a shell");
    }
    if REDIRECT_INTO_ETC.is_match(command) {
        return Err("redirecting output into /etc/");
    }
    if CURL_DATA_COMMAND_SUBSTITUTION.is_match(command) {
        return Err("curl -d payload containing command substitution");
    }
    if AWS_METADATA.is_match(command) {
        return Err("reference to the cloud instance-metadata address");
    }
    if WRITE_INTO_PROC_OR_SYS.is_match(command) {
        return Err("writing into /proc/ or /sys/");
    }
    Ok(())
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
