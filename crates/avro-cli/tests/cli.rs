use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap().parent().unwrap().to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    workspace_root().join("fixtures").join(name)
}

fn avro_cst() -> Command {
    let mut cmd = Command::cargo_bin("avro-cst").unwrap();
    for var in ["AVRO_MODE", "AVRO_MAX_DEPTH", "AVRO_MAX_INPUT_BYTES", "AVRO_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn parses_idl_protocol() {
    let mut cmd = avro_cst();
    cmd.arg("parse").arg(fixture("people.avdl"));
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("(program (doc_comment) (protocol_declaration"))
        .stdout(predicate::str::contains("(enum_declaration name: (identifier)"))
        .stdout(predicate::str::contains("return: (void_type)"));
}

#[test]
fn parses_json_schema_as_json() {
    let mut cmd = avro_cst();
    cmd.arg("parse").arg("--json").arg(fixture("user.avsc"));
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["mode"], "json");
    assert_eq!(doc["root"]["kind"], "schema");
    assert_eq!(doc["root"]["children"][0]["kind"], "record_declaration");
}

#[test]
fn broken_file_reports_diagnostics() {
    let mut cmd = avro_cst();
    cmd.arg("parse").arg(fixture("broken.avdl"));
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("(MISSING \";\")"))
        .stderr(predicate::str::contains("Syntax error"))
        .stderr(predicate::str::contains("missing `}`"))
        .stderr(predicate::str::contains("broken.avdl:"));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let bad_path = tmp_dir.path().join("bad.avdl");
    std::fs::write(&bad_path, "import idl \"open;\n").unwrap();

    let mut cmd = avro_cst();
    cmd.arg("parse").arg(&bad_path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Lex error"))
        .stderr(predicate::str::contains("unterminated string literal"));
}

#[test]
fn mode_flag_overrides_extension() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("primitive.avdl");
    std::fs::write(&path, "\"int\"").unwrap();

    let mut cmd = avro_cst();
    cmd.args(["parse", "--mode", "json"]).arg(&path);
    cmd.assert().success().stdout(predicate::str::contains("(schema (primitive_type))"));
}

#[test]
fn config_file_limits_depth() {
    let mut cmd = avro_cst();
    cmd.arg("parse")
        .arg("--config")
        .arg(fixture("config.json"))
        .arg(fixture("people.avdl"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Resource limit"));
}

#[test]
fn environment_limits_input_size() {
    let mut cmd = avro_cst();
    cmd.env("AVRO_MAX_INPUT_BYTES", "10").arg("parse").arg(fixture("user.avsc"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("byte limit"));
}

#[test]
fn check_summarises_files() {
    let mut cmd = avro_cst();
    cmd.arg("check")
        .arg(fixture("people.avdl"))
        .arg(fixture("user.avsc"))
        .arg(fixture("broken.avdl"));
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Checked 3 file(s), 1 with problems"));

    let mut clean = avro_cst();
    clean.arg("check").arg(fixture("people.avdl")).arg(fixture("user.avsc"));
    clean.assert().success();
}

#[test]
fn tokens_lists_keywords_and_comments() {
    let mut cmd = avro_cst();
    cmd.arg("tokens").arg(fixture("people.avdl"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("doc comment"))
        .stdout(predicate::str::contains("`protocol`"))
        .stdout(predicate::str::contains("end of input"));
}

#[test]
fn missing_file_fails() {
    let mut cmd = avro_cst();
    cmd.arg("parse").arg(fixture("nope.avdl"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn grammar_dump_is_json() {
    let mut cmd = avro_cst();
    cmd.arg("grammar");
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["name"], "avro");
    assert!(doc["rules"]["record_declaration"].is_object());
}
