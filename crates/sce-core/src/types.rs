use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::SceError;

pub const GLOBALS_SCHEMA_V1: &str = "sce-globals.v1";

/// Which bytecode source a script block comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptType {
    System,
    WorldMap,
    Scene,
}

impl ScriptType {
    pub fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::WorldMap => "world-map",
            Self::Scene => "scene",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text encoding of the strings embedded in a script block.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Codepage {
    #[default]
    Utf8,
    Gbk,
    Big5,
    Windows1252,
}

impl Codepage {
    pub fn from_code_page(code_page: u16) -> Result<Self, SceError> {
        match code_page {
            65001 => Ok(Self::Utf8),
            936 => Ok(Self::Gbk),
            950 => Ok(Self::Big5),
            1252 => Ok(Self::Windows1252),
            other => Err(SceError::new(
                "CODEPAGE_UNSUPPORTED",
                format!("Code page {} is not supported.", other),
            )),
        }
    }

    pub fn code_page(self) -> u16 {
        match self {
            Self::Utf8 => 65001,
            Self::Gbk => 936,
            Self::Big5 => 950,
            Self::Windows1252 => 1252,
        }
    }

    pub fn encoding(self) -> &'static Encoding {
        match self {
            Self::Utf8 => encoding_rs::UTF_8,
            Self::Gbk => encoding_rs::GBK,
            Self::Big5 => encoding_rs::BIG5,
            Self::Windows1252 => encoding_rs::WINDOWS_1252,
        }
    }

    /// Malformed sequences decode to U+FFFD rather than failing.
    pub fn decode(self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding().decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Fails with `CODEPAGE_UNMAPPABLE` when the text has characters the
    /// codepage cannot represent.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, SceError> {
        let (bytes, _, had_unmappable) = self.encoding().encode(text);
        if had_unmappable {
            return Err(SceError::new(
                "CODEPAGE_UNMAPPABLE",
                format!(
                    "Text {:?} has characters codepage {} cannot encode.",
                    text,
                    self.code_page()
                ),
            ));
        }
        Ok(bytes.into_owned())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// One command per tick.
    #[default]
    Asynchronous,
    /// Run until a waiter is pushed or the stream ends.
    Synchronous,
}

impl ExecutionMode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Asynchronous),
            1 => Some(Self::Synchronous),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Asynchronous => 0,
            Self::Synchronous => 1,
        }
    }
}

/// Sticky register deciding how a comparison result folds into the accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    #[default]
    Assign,
    And,
    Or,
}

impl ConditionOperator {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Assign),
            1 => Some(Self::And),
            2 => Some(Self::Or),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Assign => 0,
            Self::And => 1,
            Self::Or => 2,
        }
    }

    pub fn combine(self, value: bool, accumulator: bool) -> bool {
        match self {
            Self::Assign => value,
            Self::And => value && accumulator,
            Self::Or => value || accumulator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    pub id: u32,
    pub description: String,
    pub bytecode: Arc<[u8]>,
    pub codepage: Codepage,
}

impl ScriptBlock {
    pub fn new(
        id: u32,
        description: impl Into<String>,
        bytecode: impl Into<Arc<[u8]>>,
        codepage: Codepage,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            bytecode: bytecode.into(),
            codepage,
        }
    }
}

/// Read-only lookup of script blocks, as provided by the resource loader.
pub trait ScriptSource {
    fn script(&self, id: u32) -> Option<&ScriptBlock>;
    fn find_by_description(&self, description: &str) -> Option<&ScriptBlock>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBundle {
    blocks: BTreeMap<u32, ScriptBlock>,
}

impl ScriptBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any block with the same id and returns it.
    pub fn insert(&mut self, block: ScriptBlock) -> Option<ScriptBlock> {
        self.blocks.insert(block.id, block)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptBlock> {
        self.blocks.values()
    }
}

impl FromIterator<ScriptBlock> for ScriptBundle {
    fn from_iter<T: IntoIterator<Item = ScriptBlock>>(iter: T) -> Self {
        let mut bundle = Self::new();
        for block in iter {
            bundle.insert(block);
        }
        bundle
    }
}

impl ScriptSource for ScriptBundle {
    fn script(&self, id: u32) -> Option<&ScriptBlock> {
        self.blocks.get(&id)
    }

    fn find_by_description(&self, description: &str) -> Option<&ScriptBlock> {
        self.blocks
            .values()
            .find(|block| block.description == description)
    }
}

/// Lifecycle notifications recorded by the script manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScriptEvent {
    Finished {
        id: u32,
        script_type: ScriptType,
    },
    FailedToRun {
        id: u32,
        script_type: ScriptType,
        error: SceError,
    },
}

impl ScriptEvent {
    pub fn script_id(&self) -> u32 {
        match self {
            Self::Finished { id, .. } | Self::FailedToRun { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalVariableSnapshot {
    pub schema_version: String,
    pub variables: BTreeMap<i16, i32>,
}

impl GlobalVariableSnapshot {
    pub fn new(variables: BTreeMap<i16, i32>) -> Self {
        Self {
            schema_version: GLOBALS_SCHEMA_V1.to_string(),
            variables,
        }
    }
}
