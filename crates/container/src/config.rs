// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime configuration: host list, TLS material, resource
//! defaults. See spec.md §4.2 and §6.

use std::path::{Path, PathBuf};

use drape_core::ContainerDefaults;

use crate::errors::ContainerError;

/// One container-runtime endpoint: either the local daemon socket, or a
/// remote `host:port`, optionally secured with client TLS material.
#[derive(Debug, Clone)]
pub enum HostEndpoint {
    /// Talks to the local runtime over its Unix domain socket.
    Local { socket_path: PathBuf },
    /// Talks to a remote runtime over TCP, with TLS material, or plain TCP
    /// if the material directory is absent (downgraded with a warning).
    Remote { id: String, host: String, port: u16, tls: Option<TlsMaterial> },
}

impl HostEndpoint {
    pub fn id(&self) -> &str {
        match self {
            HostEndpoint::Local { .. } => "local",
            HostEndpoint::Remote { id, .. } => id,
        }
    }
}

/// Client TLS material for one remote host: `ca`, `cert`, `key` PEM bytes.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub ca_pem: Vec<u8>,
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl TlsMaterial {
    /// Load `<tls_root>/<host_id>/{ca,cert,key}.pem`. Returns `None` (rather
    /// than an error) when the directory is absent — the caller downgrades
    /// to plain TCP and logs a warning, per spec.md §4.2.
    pub async fn load(tls_root: &Path, host_id: &str) -> Result<Option<Self>, ContainerError> {
        let dir = tls_root.join(host_id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(None);
        }
        let ca_pem = tokio::fs::read(dir.join("ca.pem")).await?;
        let cert_pem = tokio::fs::read(dir.join("cert.pem")).await?;
        let key_pem = tokio::fs::read(dir.join("key.pem")).await?;
        Ok(Some(Self { ca_pem, cert_pem, key_pem }))
    }
}

/// Parsed form of the "hosts list" configuration key: either the literal
/// `local`, or a comma-separated list of `host:port` endpoints.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub hosts: Vec<HostEndpoint>,
    pub defaults: ContainerDefaults,
    pub agent_port: u16,
}

impl RuntimeConfig {
    /// Parse the hosts-list env value. `tls_root` is consulted per remote
    /// host to resolve client certificate material.
    pub async fn parse(
        hosts_spec: &str,
        tls_root: Option<&Path>,
        defaults: ContainerDefaults,
        agent_port: u16,
    ) -> Result<Self, ContainerError> {
        let mut hosts = Vec::new();
        for (i, entry) in hosts_spec.split(',').map(str::trim).filter(|s| !s.is_empty()).enumerate()
        {
            if entry == "local" {
                hosts.push(HostEndpoint::Local { socket_path: PathBuf::from("/var/run/docker.sock") });
                continue;
            }
            let (host, port) = entry
                .rsplit_once(':')
                .ok_or_else(|| ContainerError::Transport(format!("malformed host entry: {entry}")))?;
            let port: u16 = port
                .parse()
                .map_err(|_| ContainerError::Transport(format!("malformed port in: {entry}")))?;
            let id = format!("host-{i}");
            let tls = match tls_root {
                Some(root) => TlsMaterial::load(root, &id).await?,
                None => None,
            };
            if tls.is_none() && tls_root.is_some() {
                tracing::warn!(host = %entry, "no TLS material directory found, downgrading to plain TCP");
            }
            hosts.push(HostEndpoint::Remote { id, host: host.to_string(), port, tls });
        }
        if hosts.is_empty() {
            return Err(ContainerError::NoHosts);
        }
        Ok(Self { hosts, defaults, agent_port })
    }
}
