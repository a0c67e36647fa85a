use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn wordsense_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wordsense"))
}

fn run(args: &[&str]) -> Output {
    Command::new(wordsense_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .env("WORDSENSE_INITIAL_DELAY_MS", "0")
        .output()
        .expect("run wordsense")
}

fn write(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path.display().to_string()
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).expect("stdout is JSON")
}

#[test]
fn reconcile_fills_placeholder_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.txt");
    fs::write(
        &path,
        "```json\n{\"narrative\": \"A cat eats.\", \"image_data\": {\"prompt\": \"a cat\"}}\n```",
    )
    .unwrap();

    let out = run(&["reconcile", "--link-chain", path.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let chain = stdout_json(&out);
    assert_eq!(chain["image_data"]["type"], "placeholder");
    assert_eq!(chain["image_data"]["prompt"], "a cat");
}

#[test]
fn build_succeeds_and_fails_with_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let word = write(dir.path(), "word.json", &json!({"headword": "makan", "language": "id"}));
    let good = write(
        dir.path(),
        "senses.json",
        &json!([{"part_of_speech": "verb", "link_chains": [{"narrative": "n", "image_data": null}]}]),
    );
    let word_id = "6a1f8a4e-5b7c-4d8e-9f00-112233445566";

    let out = run(&["build", "--word", &word, "--senses", &good, "--word-id", word_id]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let built = stdout_json(&out);
    assert_eq!(built["word_id"], word_id);
    assert_eq!(built["senses"][0]["base_word_id"], word_id);

    let bad = write(
        dir.path(),
        "bad.json",
        &json!([{"link_chain_variations": [{"narrative": "n", "syllables": "ma-kan"}]}]),
    );
    let out = run(&["build", "--word", &word, "--senses", &bad]);
    assert_eq!(out.status.code(), Some(1));
    let report = stdout_json(&out);
    assert_eq!(report["disposition"], "retry");
    let paths: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["path"].as_str())
        .collect();
    assert!(paths.contains(&"senses[0].part_of_speech"), "{paths:?}");
    assert!(
        paths.contains(&"senses[0].link_chain_variations[0].syllables"),
        "{paths:?}"
    );
}

#[test]
fn check_round_trips_a_built_word() {
    let dir = tempfile::tempdir().unwrap();
    let word = write(dir.path(), "word.json", &json!({"headword": "bisa", "language": "id"}));
    let senses = write(dir.path(), "senses.json", &json!([{"part_of_speech": "noun"}]));

    let built = run(&["build", "--word", &word, "--senses", &senses]);
    assert!(built.status.success());
    let doc = dir.path().join("built.json");
    fs::write(&doc, &built.stdout).unwrap();

    let out = run(&["check", doc.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn replay_runs_recorded_episode() {
    let dir = tempfile::tempdir().unwrap();
    let request = write(
        dir.path(),
        "request.json",
        &json!({"headword": "makan", "language": "id", "target_language": "en", "batch_id": "replay-1"}),
    );
    let responses = dir.path().join("responses");
    fs::create_dir(&responses).unwrap();
    write(
        &responses,
        "core.json",
        &json!({"headword": "makan", "language": "id",
                "senses": [{"part_of_speech": "verb", "brief_description": "to eat"}]}),
    );
    write(
        &responses,
        "sense-0.json",
        &json!({"definition": {"text": "to eat", "language": "en"}}),
    );
    write(
        &responses,
        "chains-0.json",
        &json!({"link_chains": [{"narrative": "Mother opens a can.", "image_prompt": "tin can"}]}),
    );

    let out = run(&[
        "replay",
        "--word",
        &request,
        "--responses",
        responses.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let word = stdout_json(&out);
    assert_eq!(word["enrichment_info"][0]["batch_id"], "replay-1");
    assert_eq!(
        word["senses"][0]["link_chain_variations"][0]["image_data"]["prompt"],
        "tin can"
    );
}
