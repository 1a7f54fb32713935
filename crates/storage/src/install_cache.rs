// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Install cache bookkeeping: the L1 session-local marker and the L2
//! on-host archive path. Issuing the actual install, extract, or archive
//! exec is `drape-workspace`'s job; this module only owns the digest and
//! the filesystem locations both cache levels live at.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// 128-bit digest over the manifest bytes, the lockfile bytes, and the
/// package-manager identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstallCacheKey([u8; 16]);

impl InstallCacheKey {
    pub fn compute(manifest_bytes: &[u8], lockfile_bytes: &[u8], package_manager: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(manifest_bytes);
        hasher.update(lockfile_bytes);
        hasher.update(package_manager.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 16];
        key.copy_from_slice(&digest[..16]);
        Self(key)
    }

    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for InstallCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Path to the hidden L1 marker file inside a project's effective working
/// directory.
pub fn l1_marker_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".package-json-hash")
}

/// Read the L1 marker's recorded key, if present and well-formed.
pub async fn read_l1_marker(project_dir: &Path) -> Option<String> {
    tokio::fs::read_to_string(l1_marker_path(project_dir)).await.ok().map(|s| s.trim().to_string())
}

/// Write the L1 marker recording `key` as the last successful install.
pub async fn write_l1_marker(project_dir: &Path, key: InstallCacheKey) -> std::io::Result<()> {
    tokio::fs::write(l1_marker_path(project_dir), key.to_hex()).await
}

/// Path to the L2 on-host archive for `key` under `cache_root`.
pub fn l2_archive_path(cache_root: &Path, key: InstallCacheKey) -> PathBuf {
    cache_root.join("node-modules").join(format!("{}.tar.gz", key.to_hex()))
}

pub async fn l2_archive_exists(cache_root: &Path, key: InstallCacheKey) -> bool {
    tokio::fs::try_exists(l2_archive_path(cache_root, key)).await.unwrap_or(false)
}

#[cfg(test)]
#[path = "install_cache_tests.rs"]
mod tests;
