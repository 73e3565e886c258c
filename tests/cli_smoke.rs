use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use haystack::{
    DataDir,
    Device,
    corpus::{Corpus, FetchInfo},
};
use wiremock::{
    Mock,
    MockServer,
    ResponseTemplate,
    matchers::{header, method, path},
};

fn haystack_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_haystack") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("haystack");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}

fn haystack(
    data_dir: &Path,
    args: &[&str],
) -> Result<Output, Box<dyn std::error::Error>> {
    Ok(Command::new(haystack_bin()?)
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--log-level", "warn"])
        .args(args)
        .env_remove("HAYSTACK_LOG")
        .env("NO_PROXY", "127.0.0.1")
        .env("no_proxy", "127.0.0.1")
        .output()?)
}

fn seed_corpus(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let dir = DataDir::resolve(Some(data_dir))?;
    let staged = dir.stage_corpus()?;
    let devices = vec![
        Device {
            config: Some("interface Ethernet1\n ip address 10.0.0.1".into()),
            ..Device::new("dev1", "SN1")
        },
        Device {
            config: Some("interface Loopback0\n ip address 10.9.9.9".into()),
            ..Device::new("dev2", "SN2")
        },
    ];
    let info = FetchInfo {
        apiserver: "https://cv.example.com".into(),
        include_inactive: false,
    };
    drop(Corpus::build(&staged, &devices, &info)?);
    dir.promote(&staged)?;
    Ok(())
}

#[test]
fn no_subcommand_exits_with_one() -> Result<(), Box<dyn std::error::Error>> {
    let output = Command::new(haystack_bin()?).output()?;
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn search_without_corpus_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;

    let output = haystack(tempdir.path(), &["search", "--query", "vlan"])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8(output.stderr)?.contains("no corpus found"));
    Ok(())
}

#[test]
fn search_matches_all_terms() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    seed_corpus(tempdir.path())?;

    let output = haystack(
        tempdir.path(),
        &["search", "--query", "ethernet", "--query", "10.0.0.1"],
    )?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("hostname"));
    assert!(stdout.contains("dev1"));
    assert!(!stdout.contains("dev2"));

    let output = haystack(
        tempdir.path(),
        &["search", "--query", "ethernet", "--query", "10.0.0.2"],
    )?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout)?, "No results found\n");
    Ok(())
}

#[test]
fn search_json_output() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    seed_corpus(tempdir.path())?;

    let output =
        haystack(tempdir.path(), &["search", "--query", "loopback", "--json"])?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["result_count"], 1);
    assert_eq!(value["results"][0]["serial_number"], "SN2");
    Ok(())
}

// -- fetch-configs against a mock dataset store --

const DEVICES_BODY: &str = r#"{"notifications":[
  {"updates":{"SN1":{"key":"SN1","value":{"hostname":"dev1","status":"active","modelName":"cEOSLab"}}}},
  {"updates":{"SN2":{"key":"SN2","value":{"hostname":"dev2","status":"active"}}}},
  {"updates":{"SN3":{"key":"SN3","value":{"hostname":"dev3","status":"inactive"}}}}
]}"#;

const SN1_LINES: &str = r#"{"notifications":[{"updates":{
  "n2":{"key":"n2","value":{"text":" ip address 10.0.0.1","previous":"n1"}},
  "n1":{"key":"n1","value":{"text":"interface Ethernet1","next":"n2"}}
}}]}"#;

const SN2_LINES: &str = r#"{"notifications":[{"updates":{"b":{"key":"b","value":{"text":" ip address 10.0.0.2","previous":"a"}}}}]}
{"notifications":[{"updates":{"a":{"key":"a","value":{"text":"interface Loopback0","next":"b"}}}}]}"#;

/// Mount the dataset store's endpoints, answering only requests that
/// carry `token`. Anything else gets a 401.
async fn mount_dataset_store(server: &MockServer, token: &str) {
    let routes = [
        ("/api/v1/rest/analytics/DatasetInfo/Devices", DEVICES_BODY),
        ("/api/v1/rest/SN1/Config/running/lines", SN1_LINES),
        ("/api/v1/rest/SN2/Config/running/lines", SN2_LINES),
    ];
    for (route, body) in routes {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_then_search() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let server = MockServer::start().await;
    mount_dataset_store(&server, "s3cret").await;
    let apiserver = server.uri();

    let token_file = tempdir.path().join("token");
    std::fs::write(&token_file, "s3cret\n")?;

    let output = haystack(
        tempdir.path(),
        &[
            "fetch-configs",
            "--apiserver",
            &apiserver,
            "--access-token",
            token_file.to_str().ok_or("non-utf8 path")?,
        ],
    )?;
    assert!(
        output.status.success(),
        "fetch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = haystack(
        tempdir.path(),
        &["search", "--query", "ETHERNET", "--query", "10.0.0.1"],
    )?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("dev1"));
    assert!(!stdout.contains("dev2"));

    let output = haystack(tempdir.path(), &["status", "--json"])?;
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(status["devices"], 2);
    assert_eq!(status["apiserver"], apiserver.as_str());
    assert_eq!(status["include_inactive"], false);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_fetch_keeps_previous_corpus()
-> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    seed_corpus(tempdir.path())?;
    let server = MockServer::start().await;
    mount_dataset_store(&server, "right-token").await;
    let apiserver = server.uri();

    let output = haystack(
        tempdir.path(),
        &[
            "fetch-configs",
            "--apiserver",
            &apiserver,
            "--access-token",
            "wrong-token",
        ],
    )?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr)?.contains("401"));

    let output = haystack(tempdir.path(), &["search", "--query", "loopback"])?;
    assert!(String::from_utf8(output.stdout)?.contains("dev2"));
    Ok(())
}
