//! End-to-end tests of the fetch pipeline against a local HTTP server.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use nodestrap_core::{DistSpec, Fetcher, HttpClient, ProvisionError, Reporter, VerifyMode};

/// Build an in-memory tar.gz with a single `root/` directory.
fn archive_bytes(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, content) in files {
        let path = format!("{root}/{name}");
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, &path, content.as_bytes())
            .unwrap();
    }

    let mut bytes = builder.into_inner().unwrap().finish().unwrap();
    bytes.flush().unwrap();
    bytes
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Serve fixed responses; unknown paths get a 404.
fn spawn_server(routes: HashMap<String, Vec<u8>>) -> u16 {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            match routes.get(request.url()) {
                Some(body) => {
                    let _ = request.respond(tiny_http::Response::from_data(body.clone()));
                }
                None => {
                    let _ = request.respond(tiny_http::Response::empty(404));
                }
            }
        }
    });

    port
}

fn spec(port: u16, install_dir: &Path) -> DistSpec {
    DistSpec {
        name: "node".to_string(),
        version: "5.1.0".to_string(),
        artifact_url: format!("http://127.0.0.1:{port}/dist/pkg.tar.gz"),
        reference_url: format!("http://127.0.0.1:{port}/dist/SHASUMS256.txt"),
        install_dir: install_dir.to_path_buf(),
        archive_root: "pkg-5.1.0".to_string(),
        verify_mode: VerifyMode::Sha256Manifest,
    }
}

fn fetcher(workspace_root: &Path) -> Fetcher {
    Fetcher::with_workspace_root(Arc::new(HttpClient::new().unwrap()), workspace_root)
}

fn dir_entries(path: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(path)
        .map(|it| it.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn fetch_installs_archive_root_and_removes_workspace() {
    let tarball = archive_bytes("pkg-5.1.0", &[("bin/node", "#!node"), ("README.md", "docs")]);
    let manifest = format!("{}  pkg.tar.gz\n", sha256_hex(&tarball));

    let port = spawn_server(HashMap::from([
        ("/dist/pkg.tar.gz".to_string(), tarball),
        ("/dist/SHASUMS256.txt".to_string(), manifest.into_bytes()),
    ]));

    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");

    fetcher(&workspaces)
        .fetch(&spec(port, &install_dir), &Reporter::buffered())
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(install_dir.join("bin/node")).unwrap(),
        "#!node"
    );
    // The scratch workspace is gone
    assert!(dir_entries(&workspaces).is_empty());
}

#[tokio::test]
async fn checksum_mismatch_is_fatal_and_leaves_nothing() {
    let tarball = archive_bytes("pkg-5.1.0", &[("bin/node", "#!node")]);
    let manifest = format!("{}  pkg.tar.gz\n", sha256_hex(b"some other bytes"));

    let port = spawn_server(HashMap::from([
        ("/dist/pkg.tar.gz".to_string(), tarball),
        ("/dist/SHASUMS256.txt".to_string(), manifest.into_bytes()),
    ]));

    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");

    let err = fetcher(&workspaces)
        .fetch(&spec(port, &install_dir), &Reporter::buffered())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Integrity { .. }));
    assert!(!install_dir.exists());
    assert!(dir_entries(&workspaces).is_empty());
}

#[tokio::test]
async fn preexisting_target_fails_before_any_workspace() {
    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");
    std::fs::create_dir_all(&install_dir).unwrap();

    // Port 1 is never listening; the precondition must trip first
    let err = fetcher(&workspaces)
        .fetch(&spec(1, &install_dir), &Reporter::buffered())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Precondition { .. }));
    assert!(dir_entries(&workspaces).is_empty());
}

#[tokio::test]
async fn missing_artifact_is_download_error() {
    let manifest = format!("{}  pkg.tar.gz\n", sha256_hex(b"x"));
    let port = spawn_server(HashMap::from([(
        "/dist/SHASUMS256.txt".to_string(),
        manifest.into_bytes(),
    )]));

    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");

    let err = fetcher(&workspaces)
        .fetch(&spec(port, &install_dir), &Reporter::buffered())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Download { .. }));
    assert!(!install_dir.exists());
    assert!(dir_entries(&workspaces).is_empty());
}

#[tokio::test]
async fn corrupt_archive_fails_extraction() {
    let tarball = b"definitely not a tarball".to_vec();
    let manifest = format!("{}  pkg.tar.gz\n", sha256_hex(&tarball));

    let port = spawn_server(HashMap::from([
        ("/dist/pkg.tar.gz".to_string(), tarball),
        ("/dist/SHASUMS256.txt".to_string(), manifest.into_bytes()),
    ]));

    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");

    let err = fetcher(&workspaces)
        .fetch(&spec(port, &install_dir), &Reporter::buffered())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Extract(_)));
    assert!(dir_entries(&workspaces).is_empty());
}

/// The artifact and reference downloads must overlap. The server holds
/// the artifact response until the manifest request has arrived, so a
/// pipeline that downloaded sequentially would never finish.
#[tokio::test]
async fn artifact_and_reference_downloads_overlap() {
    let tarball = archive_bytes("pkg-5.1.0", &[("bin/node", "#!node")]);
    let manifest = format!("{}  pkg.tar.gz\n", sha256_hex(&tarball)).into_bytes();

    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();

    std::thread::spawn(move || {
        let mut held_artifact: Option<tiny_http::Request> = None;
        let mut manifest_sent = false;

        for request in server.incoming_requests() {
            if request.url().ends_with("SHASUMS256.txt") {
                let _ = request.respond(tiny_http::Response::from_data(manifest.clone()));
                manifest_sent = true;
                if let Some(held) = held_artifact.take() {
                    let _ = held.respond(tiny_http::Response::from_data(tarball.clone()));
                }
            } else if manifest_sent {
                let _ = request.respond(tiny_http::Response::from_data(tarball.clone()));
            } else {
                held_artifact = Some(request);
            }
        }
    });

    let root = TempDir::new().unwrap();
    let workspaces = root.path().join("work");
    std::fs::create_dir_all(&workspaces).unwrap();
    let install_dir = root.path().join("opt/pkg");

    let result = tokio::time::timeout(
        Duration::from_secs(15),
        fetcher(&workspaces).fetch(&spec(port, &install_dir), &Reporter::buffered()),
    )
    .await
    .expect("downloads did not overlap: pipeline deadlocked");

    result.unwrap();
    assert!(install_dir.join("bin/node").exists());
}
