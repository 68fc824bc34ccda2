use serde::{Deserialize, Serialize};

/// One decoded parameter slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    String(String),
    List(Vec<ListElement>),
    /// Slot flagged by the parameter-source mask: holds a variable id, not a literal.
    Variable(i16),
}

impl ParamValue {
    /// Integer literal widened to i32; `U32` wraps. Variables and non-integers are `None`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I8(value) => Some(i32::from(*value)),
            Self::U8(value) => Some(i32::from(*value)),
            Self::I16(value) => Some(i32::from(*value)),
            Self::U16(value) => Some(i32::from(*value)),
            Self::I32(value) => Some(*value),
            Self::U32(value) => Some(*value as i32),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(value) => Some(*value),
            _ => self.as_i32().map(|value| value as f32),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ListElement]> {
        match self {
            Self::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn variable(&self) -> Option<i16> {
        match self {
            Self::Variable(id) => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::F32(_) => "f32",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Variable(_) => "variable",
        }
    }
}

/// Element of a typed list parameter. Each variant maps to one wire tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListElement {
    /// Tag 0.
    Int(i32),
    /// Tag 1.
    Float(f32),
    /// Tag 2. Reads as an integer; kept apart from `Int` so the tag survives re-encoding.
    TaggedInt(i32),
    /// Tag 3.
    String(String),
    /// Tag 4.
    U16(u16),
}

impl ListElement {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::TaggedInt(_) => 2,
            Self::String(_) => 3,
            Self::U16(_) => 4,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(value) | Self::TaggedInt(value) => Some(*value),
            Self::U16(value) => Some(i32::from(*value)),
            _ => None,
        }
    }
}

/// A decoded command: which descriptor produced it and its parameter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub opcode: u16,
    pub name: &'static str,
    /// Bit `i` set means slot `i` was read as a variable reference.
    pub var_mask: u16,
    pub params: Vec<ParamValue>,
}

impl Command {
    pub fn param(&self, slot: usize) -> Option<&ParamValue> {
        self.params.get(slot)
    }

    pub fn is_variable_slot(&self, slot: usize) -> bool {
        slot < 16 && self.var_mask & (1 << slot) != 0
    }
}
