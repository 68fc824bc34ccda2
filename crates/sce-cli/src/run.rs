use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sce_core::{ScriptEvent, ScriptType};
use sce_runtime::ScriptManager;
use sce_tool::{assemble_pack, read_pack, AssembledPack, DispatchRecord, RecordingSink};
use serde::Serialize;
use tracing::info;

use crate::RunArgs;

pub(crate) fn load_pack(path: &Path) -> Result<AssembledPack> {
    let pack = read_pack(path)?;
    let assembled =
        assemble_pack(&pack).with_context(|| format!("assembling {}", path.display()))?;
    Ok(assembled)
}

#[derive(Serialize)]
struct DispatchLine<'a> {
    kind: &'static str,
    #[serde(flatten)]
    record: &'a DispatchRecord,
}

/// Prints what happened since the last call. Returns how many runners failed.
fn emit_progress(
    sink: &RecordingSink,
    manager: &mut ScriptManager,
    out: &mut dyn Write,
) -> Result<usize> {
    for record in sink.take_records() {
        let line = DispatchLine {
            kind: "dispatch",
            record: &record,
        };
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }

    let mut failures = 0;
    for event in manager.drain_events() {
        if matches!(event, ScriptEvent::FailedToRun { .. }) {
            failures += 1;
        }
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }
    Ok(failures)
}

pub(crate) fn run_script(args: &RunArgs, out: &mut dyn Write) -> Result<i32> {
    let pack = load_pack(&args.pack)?;
    let script_type = ScriptType::from(args.script_type);
    let sink = RecordingSink::new();
    let mut manager = ScriptManager::new(pack.manager_options(sink.clone()));

    manager
        .try_add_script(args.script, script_type)
        .with_context(|| format!("starting {} script {}", script_type, args.script))?;
    let mut failures = emit_progress(&sink, &mut manager, out)?;

    let mut ticks = 0usize;
    while manager.has_active_scripts() {
        if ticks == args.max_ticks {
            bail!(
                "scripts still active after {} ticks (raise --max-ticks?)",
                args.max_ticks
            );
        }
        manager.update(args.delta_time);
        ticks += 1;
        failures += emit_progress(&sink, &mut manager, out)?;
    }
    info!(ticks, failures, "run finished");

    if let Some(path) = &args.save_out {
        save_globals(&manager, path)?;
    }

    Ok(if failures == 0 { 0 } else { 1 })
}

fn save_globals(manager: &ScriptManager, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(&manager.export_globals())?;
    fs::write(path, payload).with_context(|| format!("writing {}", path.display()))
}
