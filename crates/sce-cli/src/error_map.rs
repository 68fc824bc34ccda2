use std::io::Write;

use sce_core::SceError;
use sce_tool::SceToolError;
use serde_json::json;

/// The innermost runtime error code in the chain, else a tool-level code.
pub(crate) fn error_code(error: &anyhow::Error) -> String {
    if let Some(runtime) = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SceError>())
    {
        return runtime.code.clone();
    }
    match error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SceToolError>())
    {
        Some(SceToolError::ReadFile { .. }) => "CLI_READ_FILE",
        Some(SceToolError::ParsePack { .. }) | Some(SceToolError::ParseCase { .. }) => "CLI_PARSE",
        Some(SceToolError::InvalidSchemaVersion { .. }) => "CLI_SCHEMA",
        Some(SceToolError::InvalidPack { .. }) => "CLI_PACK_INVALID",
        Some(SceToolError::SourceEmpty { .. }) => "CLI_SOURCE_EMPTY",
        Some(SceToolError::GuardExceeded { .. }) => "CLI_GUARD_EXCEEDED",
        Some(_) => "CLI_TOOL",
        None => "CLI_ERROR",
    }
    .to_string()
}

pub(crate) fn emit_error(out: &mut dyn Write, error: &anyhow::Error) -> i32 {
    let line = json!({
        "kind": "error",
        "code": error_code(error),
        "message": format!("{:#}", error),
    });
    let _ = writeln!(out, "{}", line);
    1
}
