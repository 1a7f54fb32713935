// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw HTTP/1.1 request/response plumbing against the container runtime's
//! control-plane endpoint: a Unix socket for `local`, or TCP (optionally
//! TLS-wrapped) for a remote host. Mirrors the teacher's hand-rolled
//! Unix-socket and TCP HTTP clients for its own agent's control plane.

use std::sync::Arc;
use std::time::Duration;

use rustls_pemfile::Item;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config::{HostEndpoint, TlsMaterial};
use crate::errors::ContainerError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response parsed off a raw HTTP/1.1 stream: status code plus body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Issue a control-plane request (`GET`/`POST`/`DELETE`) against `host` for
/// `path`, with an optional JSON body.
pub async fn request(
    host: &HostEndpoint,
    method: &str,
    path: &str,
    json_body: Option<&str>,
) -> Result<RawResponse, ContainerError> {
    tokio::time::timeout(REQUEST_TIMEOUT, request_inner(host, method, path, json_body))
        .await
        .map_err(|_| ContainerError::Transient("control-plane request timed out".into()))?
}

async fn request_inner(
    host: &HostEndpoint,
    method: &str,
    path: &str,
    json_body: Option<&str>,
) -> Result<RawResponse, ContainerError> {
    let request = build_request(method, path, json_body);

    match host {
        HostEndpoint::Local { socket_path } => {
            let mut stream = UnixStream::connect(socket_path)
                .await
                .map_err(|e| ContainerError::Transient(format!("connect failed: {e}")))?;
            stream
                .write_all(request.as_bytes())
                .await
                .map_err(|e| ContainerError::Transient(format!("write failed: {e}")))?;
            let mut reader = BufReader::new(&mut stream);
            read_response(&mut reader).await
        }
        HostEndpoint::Remote { host, port, tls, .. } => match tls {
            Some(material) => {
                let mut stream = connect_tls(host, *port, material).await?;
                stream
                    .write_all(request.as_bytes())
                    .await
                    .map_err(|e| ContainerError::Transient(format!("write failed: {e}")))?;
                let mut reader = BufReader::new(&mut stream);
                read_response(&mut reader).await
            }
            None => {
                let mut stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| ContainerError::Transient(format!("connect failed: {e}")))?;
                stream
                    .write_all(request.as_bytes())
                    .await
                    .map_err(|e| ContainerError::Transient(format!("write failed: {e}")))?;
                let mut reader = BufReader::new(&mut stream);
                read_response(&mut reader).await
            }
        },
    }
}

fn build_request(method: &str, path: &str, json_body: Option<&str>) -> String {
    match json_body {
        Some(body) => format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
        None => format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    }
}

async fn connect_tls(
    host: &str,
    port: u16,
    material: &TlsMaterial,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ContainerError> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut material.ca_pem.as_slice()) {
        let cert = cert.map_err(|e| ContainerError::Tls(format!("invalid CA cert: {e}")))?;
        roots.add(cert).map_err(|e| ContainerError::Tls(format!("invalid CA cert: {e}")))?;
    }

    let client_cert = rustls_pemfile::certs(&mut material.cert_pem.as_slice())
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| ContainerError::Tls(format!("invalid client cert: {e}")))?;
    let client_key = load_private_key(&material.key_pem)?;

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(client_cert, client_key)
        .map_err(|e| ContainerError::Tls(format!("invalid client identity: {e}")))?;

    let connector = TlsConnector::from(Arc::new(config));
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| ContainerError::Transient(format!("connect failed: {e}")))?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ContainerError::Tls(format!("invalid server name: {host}")))?;
    connector.connect(server_name, tcp).await.map_err(|e| ContainerError::Tls(format!("TLS handshake failed: {e}")))
}

fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ContainerError> {
    let mut reader = pem;
    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ContainerError::Tls(format!("invalid private key: {e}")))?
        {
            Some(Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(Item::Sec1Key(key)) => return Ok(key.into()),
            Some(_) => continue,
            None => return Err(ContainerError::Tls("no private key found in PEM".into())),
        }
    }
}

async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<RawResponse, ContainerError> {
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .map_err(|e| ContainerError::Transient(format!("read status failed: {e}")))?;
    let status: u16 = status_line.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);

    let mut content_length: usize = 0;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| ContainerError::Transient(format!("read header failed: {e}")))?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
        if lower.trim() == "transfer-encoding: chunked" {
            chunked = true;
        }
    }

    let body = if chunked {
        read_chunked_body(reader).await?
    } else if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| ContainerError::Transient(format!("read body failed: {e}")))?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::new()
    };

    Ok(RawResponse { status, body })
}

async fn read_chunked_body<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<String, ContainerError> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader
            .read_line(&mut size_line)
            .await
            .map_err(|e| ContainerError::Transient(format!("read chunk size failed: {e}")))?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| ContainerError::Transient("malformed chunked body".into()))?;
        if size == 0 {
            break;
        }
        let mut chunk = vec![0u8; size];
        reader
            .read_exact(&mut chunk)
            .await
            .map_err(|e| ContainerError::Transient(format!("read chunk failed: {e}")))?;
        body.extend_from_slice(&chunk);
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await.ok();
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
