// CLI surface of the `dossier` binary: help text, argument validation and a
// status run against a mocked backend

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dossier(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dossier").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DOSSIER_API_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_workflow_commands() {
    let dir = TempDir::new().unwrap();
    dossier(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("set-date"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("save-text"))
        .stdout(predicate::str::contains("todos"));
}

#[test]
fn test_save_text_requires_text_or_file() {
    let dir = TempDir::new().unwrap();
    dossier(&dir)
        .args(["save-text", "uc-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_missing_token_is_reported_with_hint() {
    let dir = TempDir::new().unwrap();
    dossier(&dir)
        .args(["status", "uc-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("❌"))
        .stderr(predicate::str::contains("dossier-workflow.toml"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_prints_current_step() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "uc-1",
            "name": "Notation sociale",
            "risk_level": "unacceptable",
            "deployment_date": "2020-01-01"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dossiers/uc-1/stopping_proof"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileUrl": "dossiers/c-1/uc-1/stopping_proof/arret.pdf",
            "status": "complete"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dossiers/uc-1/system_prompt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-1/nextsteps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evaluation": "Pratique interdite depuis février 2025"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("dossier-workflow.toml"),
        format!("[api]\nbase_url = \"{}\"\ntoken = \"test-token\"\n", server.uri()),
    )
    .unwrap();

    let assert = tokio::task::spawn_blocking(move || {
        dossier(&dir).args(["status", "uc-1"]).assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Notation sociale"))
        .stdout(predicate::str::contains("upload-proof"))
        .stdout(predicate::str::contains("arret.pdf"))
        .stdout(predicate::str::contains("Pratique interdite depuis février 2025"));
}
