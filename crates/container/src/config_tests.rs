// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::config::{HostEndpoint, RuntimeConfig};
use drape_core::ContainerDefaults;

#[tokio::test]
async fn local_literal_resolves_to_socket_endpoint() {
    let config = RuntimeConfig::parse("local", None, ContainerDefaults::default(), 8787).await.unwrap();
    assert_eq!(config.hosts.len(), 1);
    assert!(matches!(config.hosts[0], HostEndpoint::Local { .. }));
}

#[tokio::test]
async fn comma_separated_hosts_parse_in_order() {
    let config =
        RuntimeConfig::parse("10.0.0.1:2376,10.0.0.2:2376", None, ContainerDefaults::default(), 8787)
            .await
            .unwrap();
    assert_eq!(config.hosts.len(), 2);
    match &config.hosts[0] {
        HostEndpoint::Remote { host, port, tls, .. } => {
            assert_eq!(host, "10.0.0.1");
            assert_eq!(*port, 2376);
            assert!(tls.is_none());
        }
        _ => panic!("expected remote endpoint"),
    }
}

#[tokio::test]
async fn missing_tls_directory_downgrades_to_plain_tcp() {
    let tmp = tempfile::tempdir().unwrap();
    let config =
        RuntimeConfig::parse("10.0.0.1:2376", Some(tmp.path()), ContainerDefaults::default(), 8787)
            .await
            .unwrap();
    match &config.hosts[0] {
        HostEndpoint::Remote { tls, .. } => assert!(tls.is_none()),
        _ => panic!("expected remote endpoint"),
    }
}

#[tokio::test]
async fn tls_directory_present_loads_material() {
    let tmp = tempfile::tempdir().unwrap();
    let host_dir = tmp.path().join("host-0");
    tokio::fs::create_dir_all(&host_dir).await.unwrap();
    tokio::fs::write(host_dir.join("ca.pem"), b"ca").await.unwrap();
    tokio::fs::write(host_dir.join("cert.pem"), b"cert").await.unwrap();
    tokio::fs::write(host_dir.join("key.pem"), b"key").await.unwrap();

    let config =
        RuntimeConfig::parse("10.0.0.1:2376", Some(tmp.path()), ContainerDefaults::default(), 8787)
            .await
            .unwrap();
    match &config.hosts[0] {
        HostEndpoint::Remote { tls, .. } => assert!(tls.is_some()),
        _ => panic!("expected remote endpoint"),
    }
}

#[tokio::test]
async fn empty_hosts_spec_errors() {
    let result = RuntimeConfig::parse("", None, ContainerDefaults::default(), 8787).await;
    assert!(result.is_err());
}
