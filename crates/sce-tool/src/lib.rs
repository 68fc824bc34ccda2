mod case;
mod pack;
mod runner;
mod source;

pub use case::{ExpectedEvent, StartScript, TestCase, CASE_SCHEMA_V1};
pub use pack::{
    assemble_pack, assemble_script, AssembledPack, AssembledScript, PackCommand, PackConfig,
    PackEntry, PackInstructionSet, PackPatch, PackScript, ScriptPack, PACK_SCHEMA_V1,
};
pub use runner::{assert_case, run_case, DispatchRecord, RecordingSink, RunReport};
pub use source::{discover_cases, read_pack, read_test_case, CaseFile};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse pack {path}: {source}")]
    ParsePack {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("Invalid pack at {location}: {message}")]
    InvalidPack { location: String, message: String },
    #[error("No *.case.json files with a sibling pack.json under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("Runtime error: {0}")]
    Runtime(#[from] sce_core::SceError),
    #[error("Guard exceeded: max_ticks={max_ticks}.")]
    GuardExceeded { max_ticks: usize },
    #[error("Expected event count {expected}, actual {actual}. observed={observed}")]
    EventCountMismatch {
        expected: usize,
        actual: usize,
        observed: String,
    },
    #[error("Event mismatch at index {index}. expected={expected} actual={actual}")]
    EventMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("Global {id} mismatch: expected {expected}, actual {actual}.")]
    GlobalMismatch { id: i16, expected: i32, actual: i32 },
    #[error("Failed to serialize event for diff: {0}")]
    EventSerialize(serde_json::Error),
}
