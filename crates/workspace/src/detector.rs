// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project detector (spec.md §4.3): classifies a project tree into a
//! `ProjectInfo`, pure I/O with no side effects beyond reading files.

use std::path::{Path, PathBuf};

use drape_core::{PackageManager, ProjectInfo, ProjectType, DEFAULT_DEV_SERVER_PORT};
use serde_json::Value;

/// Monorepo locations probed by detection step 5, in order.
const MONOREPO_CANDIDATES: &[&str] = &["client", "frontend", "web", "app"];
const MONOREPO_ROOTS: &[&str] = &["apps", "packages"];

/// Detect a project's type and shape by reading its directory, per the
/// cascade in spec.md §4.3. Never fails — unrecognized trees fall through to
/// `ProjectType::Unknown`.
pub async fn detect(project_dir: &Path) -> ProjectInfo {
    if let Some(info) = detect_at(project_dir).await {
        return info;
    }

    if has_python_markers(project_dir).await {
        return ProjectInfo {
            project_type: ProjectType::Python,
            human_description: "Python project".to_string(),
            install_command: None,
            start_command: "python3 -m http.server 3000".to_string(),
            dev_server_port: DEFAULT_DEV_SERVER_PORT,
            package_manager: None,
            subdirectory: None,
        };
    }

    ProjectInfo::unknown()
}

/// Steps 1–4, step 5 (monorepo recursion), then step 6 (generic Node),
/// applied in that order per spec.md §4.3. Returns `None` if nothing
/// recognizable is found at any step (the caller then tries Python, then
/// `unknown`).
async fn detect_at(dir: &Path) -> Option<ProjectInfo> {
    if let Some(info) = detect_direct(dir).await {
        return Some(info);
    }
    if let Some(info) = recurse_monorepo(dir).await {
        return Some(info);
    }
    let manifest = read_manifest(dir).await;
    if let Some(manifest) = manifest.as_ref() {
        let package_manager = detect_package_manager(dir).await;
        return Some(detect_generic_node(manifest, package_manager));
    }
    None
}

/// Steps 1–4 only: the framework-specific and static-HTML checks, without
/// monorepo recursion (step 5) or the generic-Node fallback (step 6). Used
/// both at the root and, recursively, inside each monorepo candidate.
async fn detect_direct(dir: &Path) -> Option<ProjectInfo> {
    let manifest = read_manifest(dir).await;
    let package_manager = detect_package_manager(dir).await;

    if let Some(info) = detect_nextjs(dir, manifest.as_ref(), package_manager).await {
        return Some(info);
    }
    if let Some(info) = detect_vite(dir, manifest.as_ref(), package_manager).await {
        return Some(info);
    }
    if let Some(info) = detect_expo(manifest.as_ref(), package_manager).await {
        return Some(info);
    }
    if has_index_html_no_framework(dir, manifest.as_ref()).await {
        return Some(ProjectInfo {
            project_type: ProjectType::Static,
            human_description: "Static HTML project".to_string(),
            install_command: None,
            start_command: drape_core::static_server_command(),
            dev_server_port: DEFAULT_DEV_SERVER_PORT,
            package_manager: None,
            subdirectory: None,
        });
    }
    None
}

/// Step 5: recurse into known monorepo locations, re-applying steps 1–3
/// inside the subdirectory and rewriting commands as `cd <subdir> && ...`.
async fn recurse_monorepo(root: &Path) -> Option<ProjectInfo> {
    let root_manifest = read_manifest(root).await;
    let root_has_workspaces = root_manifest
        .as_ref()
        .map(|m| m.get("workspaces").is_some())
        .unwrap_or(false)
        || tokio::fs::try_exists(root.join("pnpm-workspace.yaml")).await.unwrap_or(false);

    let mut candidates: Vec<PathBuf> = MONOREPO_CANDIDATES.iter().map(|c| root.join(c)).collect();
    for monorepo_root in MONOREPO_ROOTS {
        let base = root.join(monorepo_root);
        if let Ok(mut entries) = tokio::fs::read_dir(&base).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().is_dir() {
                    candidates.push(entry.path());
                }
            }
        }
    }

    for candidate in candidates {
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            continue;
        }
        if let Some(mut info) = Box::pin(detect_direct(&candidate)).await {
            let subdir = candidate.strip_prefix(root).unwrap_or(&candidate).to_string_lossy().to_string();
            info.start_command = format!("cd {subdir} && {}", info.start_command);
            if !root_has_workspaces {
                if let Some(install) = info.install_command.take() {
                    info.install_command = Some(format!("cd {subdir} && {install}"));
                }
            }
            info.subdirectory = Some(subdir);
            return Some(info);
        }
    }
    None
}

async fn read_manifest(dir: &Path) -> Option<Value> {
    let bytes = tokio::fs::read(dir.join("package.json")).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn detect_package_manager(dir: &Path) -> PackageManager {
    if tokio::fs::try_exists(dir.join("pnpm-lock.yaml")).await.unwrap_or(false) {
        PackageManager::Pnpm
    } else if tokio::fs::try_exists(dir.join("yarn.lock")).await.unwrap_or(false) {
        PackageManager::Yarn
    } else {
        PackageManager::Npm
    }
}

fn has_dependency(manifest: &Value, name: &str) -> bool {
    ["dependencies", "devDependencies"]
        .iter()
        .any(|key| manifest.get(key).and_then(|deps| deps.get(name)).is_some())
}

fn dependency_range<'a>(manifest: &'a Value, name: &str) -> Option<&'a str> {
    ["dependencies", "devDependencies"]
        .iter()
        .find_map(|key| manifest.get(key).and_then(|deps| deps.get(name)).and_then(|v| v.as_str()))
}

async fn detect_nextjs(dir: &Path, manifest: Option<&Value>, pm: PackageManager) -> Option<ProjectInfo> {
    let has_config = tokio::fs::try_exists(dir.join("next.config.js")).await.unwrap_or(false)
        || tokio::fs::try_exists(dir.join("next.config.mjs")).await.unwrap_or(false)
        || tokio::fs::try_exists(dir.join("next.config.ts")).await.unwrap_or(false);
    let manifest = manifest?;
    if !has_config && !has_dependency(manifest, "next") {
        return None;
    }

    let major = dependency_range(manifest, "next").and_then(parse_major_version);
    let mut start_command = "npm run dev -- --port 3000".to_string();
    if let Some(major) = major {
        if major >= 15 {
            start_command.push_str(" --turbopack");
        }
    }

    Some(ProjectInfo {
        project_type: ProjectType::Nextjs,
        human_description: "Next.js project".to_string(),
        install_command: Some(install_command(pm)),
        start_command,
        dev_server_port: DEFAULT_DEV_SERVER_PORT,
        package_manager: Some(pm),
        subdirectory: None,
    })
}

/// Extracts the leading major version number from a semver range string
/// like `^15.0.0`, `~14.2.1`, or `15.0.0`.
fn parse_major_version(range: &str) -> Option<u32> {
    range.trim_start_matches(['^', '~', '>', '=', ' ']).split('.').next()?.parse().ok()
}

async fn detect_vite(dir: &Path, manifest: Option<&Value>, pm: PackageManager) -> Option<ProjectInfo> {
    let has_config = tokio::fs::try_exists(dir.join("vite.config.js")).await.unwrap_or(false)
        || tokio::fs::try_exists(dir.join("vite.config.ts")).await.unwrap_or(false);
    let has_dep = manifest.map(|m| has_dependency(m, "vite")).unwrap_or(false);
    if !has_config && !has_dep {
        return None;
    }

    Some(ProjectInfo {
        project_type: ProjectType::Vite,
        human_description: "Vite project".to_string(),
        install_command: Some(install_command(pm)),
        start_command: "npm run dev -- --host 0.0.0.0 --port 3000".to_string(),
        dev_server_port: DEFAULT_DEV_SERVER_PORT,
        package_manager: Some(pm),
        subdirectory: None,
    })
}

async fn detect_expo(manifest: Option<&Value>, pm: PackageManager) -> Option<ProjectInfo> {
    let manifest = manifest?;
    if !has_dependency(manifest, "expo") && !has_dependency(manifest, "react-native-web") {
        return None;
    }

    let install_command = if pm == PackageManager::Npm {
        format!("{} --legacy-peer-deps", install_command(pm))
    } else {
        install_command(pm)
    };

    Some(ProjectInfo {
        project_type: ProjectType::Expo,
        human_description: "Expo project".to_string(),
        install_command: Some(install_command),
        // Force --port 3000 regardless of any custom script, per spec.md §4.3 step 3.
        start_command: "npx expo start --web --port 3000".to_string(),
        dev_server_port: DEFAULT_DEV_SERVER_PORT,
        package_manager: Some(pm),
        subdirectory: None,
    })
}

async fn has_index_html_no_framework(dir: &Path, manifest: Option<&Value>) -> bool {
    if manifest.is_some() {
        return false;
    }
    tokio::fs::try_exists(dir.join("index.html")).await.unwrap_or(false)
}

fn detect_generic_node(manifest: &Value, pm: PackageManager) -> ProjectInfo {
    let scripts = manifest.get("scripts");
    let start_command = scripts
        .and_then(|s| s.get("dev"))
        .map(|_| format!("{} run dev", pm))
        .or_else(|| scripts.and_then(|s| s.get("start")).map(|_| format!("{} run start", pm)))
        .unwrap_or_else(drape_core::static_server_command);

    ProjectInfo {
        project_type: ProjectType::Nodejs,
        human_description: "Node.js project".to_string(),
        install_command: Some(install_command(pm)),
        start_command,
        dev_server_port: DEFAULT_DEV_SERVER_PORT,
        package_manager: Some(pm),
        subdirectory: None,
    }
}

async fn has_python_markers(dir: &Path) -> bool {
    for marker in ["requirements.txt", "pyproject.toml", "setup.py", "Pipfile"] {
        if tokio::fs::try_exists(dir.join(marker)).await.unwrap_or(false) {
            return true;
        }
    }
    false
}

fn install_command(pm: PackageManager) -> String {
    match pm {
        PackageManager::Npm => "npm install".to_string(),
        PackageManager::Yarn => "yarn install".to_string(),
        PackageManager::Pnpm => "pnpm install".to_string(),
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
