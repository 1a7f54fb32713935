// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System prompt construction (spec.md §4.9, step 4): a mode-specific base,
//! a truncated project file listing, and session environment hints.

use drape_core::{PackageManager, ProjectInfo, ProjectType};

use crate::constants::FILE_LISTING_CAP;
use crate::mode::AgentMode;

fn mode_base(mode: AgentMode) -> &'static str {
    match mode {
        AgentMode::Fast => {
            "You are a fast-acting coding assistant working inside a sandboxed \
             development workspace. Make the requested change directly, favoring \
             the smallest correct edit. Finish by calling signal_completion."
        }
        AgentMode::Plan => {
            "You are planning, not executing. Do not write or edit any files and do \
             not run commands that mutate the project. Break the request into a \
             todo list with todo_write, then finish by calling signal_completion \
             describing the plan. Never call write_file, edit_file, or a mutating \
             run_command in this mode."
        }
        AgentMode::Execute => {
            "You are an autonomous coding agent working inside a sandboxed \
             development workspace. Investigate the project, make the requested \
             change, verify it, and use todo_write to track multi-step work. \
             Finish by calling signal_completion once the change is complete and \
             verified."
        }
    }
}

fn package_manager_str(pm: PackageManager) -> &'static str {
    match pm {
        PackageManager::Npm => "npm",
        PackageManager::Yarn => "yarn",
        PackageManager::Pnpm => "pnpm",
    }
}

fn project_type_str(t: ProjectType) -> &'static str {
    match t {
        ProjectType::Static => "static",
        ProjectType::Nodejs => "nodejs",
        ProjectType::Nextjs => "nextjs",
        ProjectType::Vite => "vite",
        ProjectType::Expo => "expo",
        ProjectType::Python => "python",
        ProjectType::Unknown => "unknown",
    }
}

/// Session environment hints appended after the file listing: project
/// directory, agent URL, detected type and package manager, when known.
pub struct EnvironmentHints<'a> {
    pub project_dir: &'a str,
    pub agent_url: &'a str,
    pub project_info: Option<&'a ProjectInfo>,
}

/// Build the full system prompt for one `run` call.
///
/// `file_listing` is the project's files, already gathered by the caller
/// (via the orchestrator's `listFiles`); this function only truncates it to
/// [`FILE_LISTING_CAP`] entries, matching spec.md §4.9 step 4.
pub fn build_system_prompt(mode: AgentMode, file_listing: &[String], hints: &EnvironmentHints<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(mode_base(mode));
    prompt.push_str("\n\nProject files");
    if file_listing.len() > FILE_LISTING_CAP {
        prompt.push_str(&format!(" (showing {FILE_LISTING_CAP} of {}):\n", file_listing.len()));
    } else {
        prompt.push_str(":\n");
    }
    for entry in file_listing.iter().take(FILE_LISTING_CAP) {
        prompt.push_str("- ");
        prompt.push_str(entry);
        prompt.push('\n');
    }

    prompt.push_str("\nEnvironment:\n");
    prompt.push_str(&format!("- project directory: {}\n", hints.project_dir));
    prompt.push_str(&format!("- agent URL: {}\n", hints.agent_url));
    match hints.project_info {
        Some(info) => {
            prompt.push_str(&format!("- detected project type: {}\n", project_type_str(info.project_type)));
            if let Some(pm) = info.package_manager {
                prompt.push_str(&format!("- package manager: {}\n", package_manager_str(pm)));
            }
        }
        None => prompt.push_str("- detected project type: unknown (not yet prepared)\n"),
    }

    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
