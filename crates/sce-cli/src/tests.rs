use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use serde_json::Value;

use super::*;
use crate::cli_args::{ScriptTypeArg, DEFAULT_DELTA_TIME, DEFAULT_MAX_TICKS};
use crate::error_map::error_code;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should move forward")
        .as_nanos();
    std::env::temp_dir().join(format!("sce-cli-{}-{}", name, nanos))
}

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
}

fn demo_pack(name: &str) -> String {
    demos_dir()
        .join(name)
        .join("pack.json")
        .to_string_lossy()
        .to_string()
}

fn invoke(args: &[&str]) -> (anyhow::Result<i32>, String) {
    let cli = Cli::try_parse_from(std::iter::once("sce-cli").chain(args.iter().copied()))
        .expect("args should parse");
    let mut out = Vec::new();
    let result = run(cli, &mut out);
    (result, String::from_utf8(out).expect("output should be utf8"))
}

fn json_lines(output: &str) -> Vec<Value> {
    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line should be json"))
        .collect()
}

#[test]
fn run_args_use_defaults() {
    let cli = Cli::try_parse_from(["sce-cli", "run", "--pack", "p.json", "--script", "3"])
        .expect("args should parse");
    let Mode::Run(args) = cli.command else {
        panic!("expected run");
    };
    assert_eq!(args.script, 3);
    assert_eq!(args.script_type, ScriptTypeArg::System);
    assert_eq!(args.delta_time, DEFAULT_DELTA_TIME);
    assert_eq!(args.max_ticks, DEFAULT_MAX_TICKS);
    assert!(args.save_out.is_none());
    assert!(cli.log_level.is_none());

    let cli = Cli::try_parse_from([
        "sce-cli",
        "disasm",
        "--pack",
        "p.json",
        "--script",
        "5",
        "--script-type",
        "world-map",
        "--log-level",
        "debug",
    ])
    .expect("args should parse");
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(matches!(
        cli.command,
        Mode::Disasm(DisasmArgs {
            script_type: ScriptTypeArg::WorldMap,
            ..
        })
    ));
}

#[test]
fn run_prints_dispatches_events_and_saves_globals() {
    let pack = demo_pack("intro");
    let save = temp_dir("run").join("save").join("globals.json");
    let save_arg = save.to_string_lossy().to_string();
    let (result, output) = invoke(&[
        "run", "--pack", &pack, "--script", "1", "--save-out", &save_arg,
    ]);
    assert_eq!(result.expect("run should pass"), 0);

    let lines = json_lines(&output);
    let kinds = lines
        .iter()
        .map(|line| line["kind"].as_str().expect("kind").to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            "dispatch", "dispatch", "dispatch", "dispatch", "dispatch", "dispatch", "finished",
            "finished"
        ]
    );
    assert_eq!(lines[0]["scriptId"], 1);
    assert_eq!(lines[0]["scriptType"], "system");
    assert_eq!(lines[0]["position"], 46);
    assert_eq!(lines[0]["command"]["name"], "CameraFadeIn");
    assert_eq!(lines[3]["scriptType"], "scene");
    assert_eq!(lines[5]["command"]["name"], "StopMusic");
    assert_eq!(lines[6]["id"], 20);

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&save).expect("save should exist"))
            .expect("save should be json");
    assert_eq!(saved["schemaVersion"], "sce-globals.v1");
    assert_eq!(saved["variables"]["-1"], 13);
}

#[test]
fn run_exits_with_one_when_a_script_fails() {
    let pack = demo_pack("worldmap");
    let (result, output) = invoke(&[
        "run",
        "--pack",
        &pack,
        "--script",
        "5",
        "--script-type",
        "world-map",
    ]);
    assert_eq!(result.expect("run should complete"), 1);

    let lines = json_lines(&output);
    let last = lines.last().expect("at least one line");
    assert_eq!(last["kind"], "failedToRun");
    assert_eq!(last["error"]["code"], "RUNNER_SEEK_OUT_OF_RANGE");
}

#[test]
fn run_stops_at_the_tick_guard() {
    let pack = demo_pack("worldmap");
    let (result, _) = invoke(&[
        "run",
        "--pack",
        &pack,
        "--script",
        "5",
        "--script-type",
        "world-map",
        "--max-ticks",
        "2",
    ]);
    let error = result.expect_err("guard should trip");
    assert!(error.to_string().contains("after 2 ticks"));
}

#[test]
fn run_reports_runtime_codes_for_missing_scripts() {
    let pack = demo_pack("intro");
    let (result, output) = invoke(&["run", "--pack", &pack, "--script", "404"]);
    let error = result.expect_err("missing script should fail");
    assert_eq!(error_code(&error), "MANAGER_SCRIPT_NOT_FOUND");
    assert!(output.is_empty());

    let (result, _) = invoke(&[
        "run",
        "--pack",
        &pack,
        "--script",
        "5",
        "--script-type",
        "world-map",
    ]);
    let error = result.expect_err("missing source should fail");
    assert_eq!(error_code(&error), "MANAGER_SOURCE_MISSING");
}

#[test]
fn run_reports_unreadable_packs() {
    let missing = temp_dir("missing").join("pack.json");
    let missing_arg = missing.to_string_lossy().to_string();
    let (result, _) = invoke(&["run", "--pack", &missing_arg, "--script", "1"]);
    let error = result.expect_err("missing pack should fail");
    assert_eq!(error_code(&error), "CLI_READ_FILE");
}

#[test]
fn disasm_prints_header_labels_and_positions() {
    let pack = demo_pack("intro");
    let (result, output) = invoke(&["disasm", "--pack", &pack, "--script", "1"]);
    assert_eq!(result.expect("disasm should pass"), 0);

    let lines = output.lines().collect::<Vec<_>>();
    assert!(lines[0].starts_with("; system script 1 \"prologue\""));
    assert_eq!(lines[1], "000000   6 VarSetValue -1 0");
    assert_eq!(lines[2], "loop:");
    assert!(lines.contains(&"done:"));
    assert!(lines.contains(&"000046  50 CameraFadeIn"));
    assert!(lines.contains(&"000093  55 PlayMusic \"theme\" 1"));
}

#[test]
fn disasm_rejects_unknown_scripts() {
    let pack = demo_pack("intro");
    let (result, _) = invoke(&[
        "disasm",
        "--pack",
        &pack,
        "--script",
        "21",
        "--script-type",
        "scene",
    ]);
    let error = result.expect_err("unknown script");
    assert_eq!(error_code(&error), "CLI_SCRIPT_NOT_FOUND");
}

#[test]
fn check_passes_every_demo_case() {
    let demos = demos_dir().to_string_lossy().to_string();
    let (result, output) = invoke(&["check", "--cases-dir", &demos]);
    assert_eq!(result.expect("check should run"), 0, "{}", output);
    assert!(output.contains("PASS"));
    assert!(output.trim_end().ends_with("2 passed, 0 failed"));
}

#[test]
fn check_reports_failing_cases() {
    let root = temp_dir("check");
    fs::create_dir_all(&root).expect("root should be created");
    fs::copy(demos_dir().join("intro").join("pack.json"), root.join("pack.json"))
        .expect("pack should copy");
    fs::write(
        root.join("wrong.case.json"),
        r#"{
  "schemaVersion": "sce-case.v1",
  "start": [{ "scriptType": "system", "id": 1 }],
  "globals": { "-1": 99 },
  "expectedEvents": []
}"#,
    )
    .expect("case should be written");

    let root_arg = root.to_string_lossy().to_string();
    let (result, output) = invoke(&["check", "--cases-dir", &root_arg]);
    assert_eq!(result.expect("check should run"), 1);
    assert!(output.contains("FAIL"));
    assert!(output.trim_end().ends_with("0 passed, 1 failed"));
}

#[test]
fn check_fails_on_empty_directories() {
    let root = temp_dir("check-empty");
    fs::create_dir_all(&root).expect("root should be created");
    let root_arg = root.to_string_lossy().to_string();
    let (result, _) = invoke(&["check", "--cases-dir", &root_arg]);
    let error = result.expect_err("empty dir should fail");
    assert_eq!(error_code(&error), "CLI_SOURCE_EMPTY");
}
