use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use sce_core::{Command, ScriptType};
use sce_runtime::{CancelableWaiter, CommandSink, DispatchContext, ScriptManager};
use serde::Serialize;
use tracing::debug;

use crate::pack::AssembledPack;
use crate::source::{read_pack, read_test_case};
use crate::{assemble_pack, ExpectedEvent, SceToolError, TestCase};

/// One command handed to the sink, with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRecord {
    pub script_id: u32,
    pub script_type: ScriptType,
    pub position: u64,
    pub command: Command,
}

/// Records every dispatch. Clones share one log, so a clone kept outside
/// the manager sees what the manager's copy recorded.
///
/// `SceneExecuteScript` injects the named scene script with preemption and
/// `UiShowMessage` is acknowledged straight away.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Rc<RefCell<Vec<DispatchRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_records(&self) -> Vec<DispatchRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }
}

impl CommandSink for RecordingSink {
    fn dispatch(&mut self, command: &Command, context: &mut DispatchContext<'_>) {
        self.records.borrow_mut().push(DispatchRecord {
            script_id: context.script_id(),
            script_type: context.script_type(),
            position: context.position(),
            command: command.clone(),
        });

        match command.name {
            "SceneExecuteScript" => {
                if let Some(description) = command.param(0).and_then(|value| value.as_str()) {
                    context.inject_scene_script(description, true);
                }
            }
            "UiShowMessage" => {
                let (waiter, handle) = CancelableWaiter::new();
                context.push_waiter(waiter);
                handle.cancel();
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observed_events: Vec<ExpectedEvent>,
    pub globals: BTreeMap<i16, i32>,
    pub ticks: usize,
}

pub fn run_case(pack: &AssembledPack, case: &TestCase) -> Result<RunReport, SceToolError> {
    let sink = RecordingSink::new();
    let mut manager = ScriptManager::new(pack.manager_options(sink.clone()));
    let mut observed_events = Vec::new();

    for start in &case.start {
        manager.try_add_script(start.id, start.script_type)?;
    }
    collect(&sink, &mut manager, &mut observed_events);

    for tick in 1..=case.max_ticks {
        manager.update(case.delta_time);
        collect(&sink, &mut manager, &mut observed_events);
        if !manager.has_active_scripts() {
            debug!(tick, events = observed_events.len(), "case finished");
            return Ok(RunReport {
                observed_events,
                globals: manager.export_globals().variables,
                ticks: tick,
            });
        }
    }

    Err(SceToolError::GuardExceeded {
        max_ticks: case.max_ticks,
    })
}

fn collect(sink: &RecordingSink, manager: &mut ScriptManager, observed: &mut Vec<ExpectedEvent>) {
    observed.extend(
        sink.take_records()
            .into_iter()
            .map(|record| ExpectedEvent::Dispatch {
                script_id: record.script_id,
                op: record.command.name.to_string(),
            }),
    );
    observed.extend(manager.drain_events().into_iter().map(ExpectedEvent::from));
}

pub fn assert_case(pack_path: &Path, case_path: &Path) -> Result<RunReport, SceToolError> {
    let pack = assemble_pack(&read_pack(pack_path)?)?;
    let case = read_test_case(case_path)?;
    let report = run_case(&pack, &case)?;

    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(SceToolError::EventSerialize)?;
        return Err(SceToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if expected != actual {
            let expected = serde_json::to_string(expected).map_err(SceToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(SceToolError::EventSerialize)?;
            return Err(SceToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    for (id, expected) in &case.globals {
        let actual = report.globals.get(id).copied().unwrap_or(0);
        if actual != *expected {
            return Err(SceToolError::GlobalMismatch {
                id: *id,
                expected: *expected,
                actual,
            });
        }
    }

    Ok(report)
}
