use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{ScriptPack, SceToolError, TestCase, CASE_SCHEMA_V1, PACK_SCHEMA_V1};

const CASE_SUFFIX: &str = ".case.json";
const PACK_FILE_NAME: &str = "pack.json";

/// A case file and the pack that sits next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFile {
    pub case_path: PathBuf,
    pub pack_path: PathBuf,
}

fn read_text(path: &Path) -> Result<String, SceToolError> {
    fs::read_to_string(path).map_err(|source| SceToolError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_pack(pack_path: &Path) -> Result<ScriptPack, SceToolError> {
    let raw = read_text(pack_path)?;
    let parsed: ScriptPack =
        serde_json::from_str(&raw).map_err(|source| SceToolError::ParsePack {
            path: pack_path.to_path_buf(),
            source,
        })?;

    if parsed.schema_version != PACK_SCHEMA_V1 {
        return Err(SceToolError::InvalidSchemaVersion {
            expected: PACK_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, SceToolError> {
    let raw = read_text(case_path)?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| SceToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != CASE_SCHEMA_V1 {
        return Err(SceToolError::InvalidSchemaVersion {
            expected: CASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

/// Finds every `*.case.json` under `dir` that has a `pack.json` sibling,
/// sorted by path.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>, SceToolError> {
    let mut cases = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path.to_string_lossy().ends_with(CASE_SUFFIX) {
            continue;
        }
        let Some(pack_path) = path.parent().map(|parent| parent.join(PACK_FILE_NAME)) else {
            continue;
        };
        if pack_path.is_file() {
            cases.push(CaseFile {
                case_path: path.to_path_buf(),
                pack_path,
            });
        }
    }

    if cases.is_empty() {
        return Err(SceToolError::SourceEmpty {
            path: dir.to_path_buf(),
        });
    }

    Ok(cases)
}
