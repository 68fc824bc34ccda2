use std::collections::BTreeMap;

use sce_core::{ScriptEvent, ScriptType};
use serde::{Deserialize, Serialize};

pub const CASE_SCHEMA_V1: &str = "sce-case.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    pub start: Vec<StartScript>,
    #[serde(default = "default_delta_time")]
    pub delta_time: f32,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,
    /// Global values expected once every script has finished.
    #[serde(default)]
    pub globals: BTreeMap<i16, i32>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
}

fn default_delta_time() -> f32 {
    1.0 / 30.0
}

fn default_max_ticks() -> usize {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScript {
    pub script_type: ScriptType,
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedEvent {
    Dispatch {
        #[serde(rename = "scriptId")]
        script_id: u32,
        op: String,
    },
    Finished {
        id: u32,
        #[serde(rename = "scriptType")]
        script_type: ScriptType,
    },
    Failed {
        id: u32,
        code: String,
    },
}

impl From<ScriptEvent> for ExpectedEvent {
    fn from(event: ScriptEvent) -> Self {
        match event {
            ScriptEvent::Finished { id, script_type } => Self::Finished { id, script_type },
            ScriptEvent::FailedToRun { id, error, .. } => Self::Failed {
                id,
                code: error.code,
            },
        }
    }
}
