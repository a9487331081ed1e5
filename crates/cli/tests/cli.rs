use assert_cmd::Command;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;

const PLAN: &str = r#"{
  "format_version": "1.2",
  "resource_changes": [
    {
      "address": "aws_s3_bucket.logs",
      "mode": "managed",
      "type": "aws_s3_bucket",
      "name": "logs",
      "change": { "actions": ["create"], "before": null, "after": {} }
    },
    {
      "address": "aws_iam_role.ci",
      "mode": "managed",
      "type": "aws_iam_role",
      "name": "ci",
      "change": { "actions": ["delete", "create"], "before": {}, "after": {} }
    }
  ]
}"#;

fn run_json(args: &[&str]) -> Value {
    let output = Command::cargo_bin("tf-index")
        .expect("binary built")
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("run tf-index");
    assert!(output.status.success(), "tf-index failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("json summary")
}

#[test]
fn json_summary_counts_documents_and_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("main.tf"),
        "resource \"aws_s3_bucket\" \"logs\" {\n  bucket = \"logs\"\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("broken.tf"), "resource \"aws_iam_role\" \"ci\" {\n").unwrap();
    fs::write(dir.path().join("prod.tfplan"), PLAN).unwrap();

    let root = dir.path().to_str().unwrap();
    let summary = run_json(&["--json", root]);

    assert_eq!(summary["crawl"]["files"], 3);
    assert_eq!(summary["crawl"]["indexed"], 2);
    assert_eq!(summary["crawl"]["failed"], 1);

    let roots = summary["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["templates"], 1);
    assert_eq!(roots[0]["plans"], 1);
    assert_eq!(roots[0]["resources"], 1);
    assert_eq!(roots[0]["planned"]["create"], 1);
    assert_eq!(roots[0]["planned"]["replace"], 1);

    let diagnostics = summary["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0]["path"].as_str().unwrap().ends_with("broken.tf"));
}

#[test]
fn exclude_flag_and_config_file_are_combined() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("legacy")).unwrap();
    fs::create_dir_all(dir.path().join("generated")).unwrap();
    fs::write(
        dir.path().join(".terraform-indexer.toml"),
        "[indexing]\nexclude = [\"legacy/**\"]\n",
    )
    .unwrap();
    fs::write(dir.path().join("main.tf"), "variable \"region\" {}\n").unwrap();
    fs::write(dir.path().join("legacy/old.tf"), "variable \"old\" {}\n").unwrap();
    fs::write(dir.path().join("generated/out.tf"), "variable \"gen\" {}\n").unwrap();

    let root = dir.path().to_str().unwrap();
    let summary = run_json(&["--json", "--exclude", "generated/**", root]);

    assert_eq!(summary["crawl"]["indexed"], 1);
    assert_eq!(summary["crawl"]["skipped"], 2);
}

#[test]
fn missing_root_is_an_error() {
    Command::cargo_bin("tf-index")
        .unwrap()
        .arg("/definitely/not/a/terraform/root")
        .assert()
        .failure();
}
