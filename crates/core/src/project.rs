// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project classification types produced by the project detector.

use crate::simple_display;
use serde::{Deserialize, Serialize};

/// Closed set of project types the detector can classify a tree into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Static,
    Nodejs,
    Nextjs,
    Vite,
    Expo,
    Python,
    Unknown,
}

simple_display! {
    ProjectType {
        Static => "static",
        Nodejs => "nodejs",
        Nextjs => "nextjs",
        Vite => "vite",
        Expo => "expo",
        Python => "python",
        Unknown => "unknown",
    }
}

impl ProjectType {
    /// Types for which the installer and dev-server supervisor are skipped
    /// entirely.
    pub fn skips_install_and_start(self) -> bool {
        matches!(self, ProjectType::Static | ProjectType::Unknown)
    }
}

/// Package manager inferred from the lockfile present in a project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

simple_display! {
    PackageManager {
        Npm => "npm",
        Yarn => "yarn",
        Pnpm => "pnpm",
    }
}

impl PackageManager {
    pub fn lockfile_name(self) -> &'static str {
        match self {
            PackageManager::Npm => "package-lock.json",
            PackageManager::Yarn => "yarn.lock",
            PackageManager::Pnpm => "pnpm-lock.yaml",
        }
    }
}

/// Default port the dev server listens on inside the container.
pub const DEFAULT_DEV_SERVER_PORT: u16 = 3000;

/// Result of classifying a project directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_type: ProjectType,
    pub human_description: String,
    pub install_command: Option<String>,
    pub start_command: String,
    #[serde(default = "default_dev_server_port")]
    pub dev_server_port: u16,
    pub package_manager: Option<PackageManager>,
    /// Populated when the runnable app lives under a monorepo path.
    pub subdirectory: Option<String>,
}

fn default_dev_server_port() -> u16 {
    DEFAULT_DEV_SERVER_PORT
}

impl ProjectInfo {
    pub fn unknown() -> Self {
        Self {
            project_type: ProjectType::Unknown,
            human_description: "Unrecognized project layout".to_string(),
            install_command: None,
            start_command: static_server_command(),
            dev_server_port: DEFAULT_DEV_SERVER_PORT,
            package_manager: None,
            subdirectory: None,
        }
    }
}

/// The fallback static-file-server command shared by the `static`, generic
/// Node (no scripts), and `unknown` detection branches.
pub fn static_server_command() -> String {
    format!("npx --yes serve -l {DEFAULT_DEV_SERVER_PORT}")
}
