use std::collections::{BTreeMap, BTreeSet};

use sce_core::{
    Codepage, Command, ExecutionMode, ListElement, ParamValue, ScriptBlock, ScriptBundle,
    ScriptSource, ScriptType,
};
use sce_runtime::{
    build_command, encode_script, encoded_len, CommandPatchTable, CommandPatcher, CommandSink,
    DescriptorTable, InstructionSet, ParamKind, ScriptManagerOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SceToolError;

pub const PACK_SCHEMA_V1: &str = "sce-pack.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptPack {
    pub schema_version: String,
    #[serde(default)]
    pub config: PackConfig,
    #[serde(default)]
    pub system: Vec<PackScript>,
    /// `None` leaves the manager without a world-map source.
    #[serde(default)]
    pub world_map: Option<Vec<PackScript>>,
    #[serde(default)]
    pub scene: Option<Vec<PackScript>>,
    #[serde(default)]
    pub patches: Vec<PackPatch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackConfig {
    pub instruction_set: PackInstructionSet,
    pub default_execution_mode: ExecutionMode,
    pub random_seed: u32,
    pub codepage: Codepage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackInstructionSet {
    #[default]
    Base,
    Extended,
}

impl From<PackInstructionSet> for InstructionSet {
    fn from(value: PackInstructionSet) -> Self {
        match value {
            PackInstructionSet::Base => InstructionSet::Base,
            PackInstructionSet::Extended => InstructionSet::Extended,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackScript {
    pub id: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub codepage: Option<Codepage>,
    #[serde(default)]
    pub commands: Vec<PackEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackEntry {
    Label { label: String },
    Command(PackCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackCommand {
    pub op: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Slots that hold a variable id instead of a literal.
    #[serde(default)]
    pub vars: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackPatch {
    pub script_type: ScriptType,
    pub script_id: u32,
    pub position: u64,
    pub command: PackCommand,
}

/// A pack turned into bytecode, ready to drive a manager.
#[derive(Debug, Clone)]
pub struct AssembledPack {
    pub instruction_set: InstructionSet,
    pub default_execution_mode: ExecutionMode,
    pub random_seed: u32,
    pub system: ScriptBundle,
    pub world_map: Option<ScriptBundle>,
    pub scene: Option<ScriptBundle>,
    pub patches: CommandPatchTable,
    pub labels: BTreeMap<(ScriptType, u32), BTreeMap<String, usize>>,
}

impl AssembledPack {
    pub fn table(&self) -> &'static DescriptorTable {
        DescriptorTable::for_instruction_set(self.instruction_set)
    }

    pub fn bundle(&self, script_type: ScriptType) -> Option<&ScriptBundle> {
        match script_type {
            ScriptType::System => Some(&self.system),
            ScriptType::WorldMap => self.world_map.as_ref(),
            ScriptType::Scene => self.scene.as_ref(),
        }
    }

    pub fn block(&self, script_type: ScriptType, id: u32) -> Option<&ScriptBlock> {
        self.bundle(script_type)?.script(id)
    }

    pub fn manager_options(&self, sink: impl CommandSink + 'static) -> ScriptManagerOptions {
        let mut options = ScriptManagerOptions::new(self.system.clone(), sink);
        options.instruction_set = self.instruction_set;
        options.default_execution_mode = self.default_execution_mode;
        options.random_seed = self.random_seed;
        options.world_map_source = self
            .world_map
            .clone()
            .map(|bundle| Box::new(bundle) as Box<dyn ScriptSource>);
        options.scene_source = self
            .scene
            .clone()
            .map(|bundle| Box::new(bundle) as Box<dyn ScriptSource>);
        if !self.patches.is_empty() {
            options.patcher = Some(Box::new(self.patches.clone()) as Box<dyn CommandPatcher>);
        }
        options
    }
}

/// One script's bytecode plus what the layout pass learned about it.
#[derive(Debug, Clone)]
pub struct AssembledScript {
    pub block: ScriptBlock,
    pub labels: BTreeMap<String, usize>,
    /// Byte offset of every command, in stream order.
    pub command_offsets: BTreeSet<usize>,
}

pub fn assemble_pack(pack: &ScriptPack) -> Result<AssembledPack, SceToolError> {
    if pack.schema_version != PACK_SCHEMA_V1 {
        return Err(SceToolError::InvalidSchemaVersion {
            expected: PACK_SCHEMA_V1.to_string(),
            found: pack.schema_version.clone(),
        });
    }

    let instruction_set = InstructionSet::from(pack.config.instruction_set);
    let table = DescriptorTable::for_instruction_set(instruction_set);
    let mut labels = BTreeMap::new();
    let mut command_offsets = BTreeMap::new();

    let mut assemble_group = |script_type: ScriptType,
                              scripts: &[PackScript]|
     -> Result<ScriptBundle, SceToolError> {
        let mut bundle = ScriptBundle::new();
        for script in scripts {
            let location = format!("{} script {}", script_type, script.id);
            let assembled = assemble_script(table, script, pack.config.codepage)?;
            if bundle.insert(assembled.block).is_some() {
                return Err(invalid(&location, "duplicate script id"));
            }
            labels.insert((script_type, script.id), assembled.labels);
            command_offsets.insert((script_type, script.id), assembled.command_offsets);
        }
        Ok(bundle)
    };

    let system = assemble_group(ScriptType::System, &pack.system)?;
    let world_map = pack
        .world_map
        .as_deref()
        .map(|scripts| assemble_group(ScriptType::WorldMap, scripts))
        .transpose()?;
    let scene = pack
        .scene
        .as_deref()
        .map(|scripts| assemble_group(ScriptType::Scene, scripts))
        .transpose()?;

    let mut patches = CommandPatchTable::new();
    for patch in &pack.patches {
        let location = format!(
            "patch for {} script {} at {}",
            patch.script_type, patch.script_id, patch.position
        );
        let key = (patch.script_type, patch.script_id);
        let offsets = command_offsets
            .get(&key)
            .ok_or_else(|| invalid(&location, "no such script in the pack"))?;
        let on_boundary = usize::try_from(patch.position)
            .map(|position| offsets.contains(&position))
            .unwrap_or(false);
        if !on_boundary {
            return Err(invalid(&location, "position is not the start of a command"));
        }
        let script_labels = labels.get(&key);
        let command = build_pack_command(table, &patch.command, script_labels, &location)?;
        if patches
            .insert(patch.script_type, patch.script_id, patch.position, command)
            .is_some()
        {
            return Err(invalid(&location, "duplicate patch position"));
        }
    }

    Ok(AssembledPack {
        instruction_set,
        default_execution_mode: pack.config.default_execution_mode,
        random_seed: pack.config.random_seed,
        system,
        world_map,
        scene,
        patches,
        labels,
    })
}

/// Lays the script out once to place labels, then emits it with labels resolved.
pub fn assemble_script(
    table: &DescriptorTable,
    script: &PackScript,
    default_codepage: Codepage,
) -> Result<AssembledScript, SceToolError> {
    let codepage = script.codepage.unwrap_or(default_codepage);
    let script_location = format!("script {}", script.id);

    let mut labels = BTreeMap::new();
    let mut command_offsets = BTreeSet::new();
    let mut offset = 0usize;
    for (index, entry) in script.commands.iter().enumerate() {
        let location = format!("{} entry {}", script_location, index);
        match entry {
            PackEntry::Label { label } => {
                if labels.insert(label.clone(), offset).is_some() {
                    return Err(invalid(&location, format!("label \"{}\" defined twice", label)));
                }
            }
            PackEntry::Command(command) => {
                let command = build_pack_command(table, command, None, &location)?;
                command_offsets.insert(offset);
                offset += encoded_len(table, &command, codepage)
                    .map_err(|error| invalid(&location, error.to_string()))?;
            }
        }
    }

    let mut commands = Vec::new();
    for (index, entry) in script.commands.iter().enumerate() {
        if let PackEntry::Command(command) = entry {
            let location = format!("{} entry {}", script_location, index);
            commands.push(build_pack_command(table, command, Some(&labels), &location)?);
        }
    }
    let bytes = encode_script(table, &commands, codepage)
        .map_err(|error| invalid(&script_location, error.to_string()))?;

    Ok(AssembledScript {
        block: ScriptBlock::new(script.id, script.description.clone(), bytes, codepage),
        labels,
        command_offsets,
    })
}

/// With `labels == None` every label reference resolves to 0 (layout pass).
fn build_pack_command(
    table: &DescriptorTable,
    command: &PackCommand,
    labels: Option<&BTreeMap<String, usize>>,
    location: &str,
) -> Result<Command, SceToolError> {
    let descriptor = table.by_name(&command.op).ok_or_else(|| {
        invalid(
            location,
            format!(
                "unknown op \"{}\" for the {:?} instruction set",
                command.op,
                table.instruction_set()
            ),
        )
    })?;
    if command.args.len() != descriptor.params.len() {
        return Err(invalid(
            location,
            format!(
                "{} takes {} args, got {}",
                descriptor.name,
                descriptor.params.len(),
                command.args.len()
            ),
        ));
    }

    let mut var_mask = 0u16;
    for slot in &command.vars {
        if *slot >= descriptor.params.len() {
            return Err(invalid(
                location,
                format!("{} has no slot {}", descriptor.name, slot),
            ));
        }
        var_mask |= 1 << slot;
    }

    let params = descriptor
        .params
        .iter()
        .zip(&command.args)
        .enumerate()
        .map(|(slot, (kind, arg))| {
            let by_variable = var_mask & (1 << slot) != 0;
            convert_arg(*kind, by_variable, arg, labels)
                .map_err(|message| invalid(location, format!("slot {}: {}", slot, message)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    build_command(table, descriptor.name, var_mask, params)
        .map_err(|error| invalid(location, error.to_string()))
}

fn convert_arg(
    kind: ParamKind,
    by_variable: bool,
    arg: &Value,
    labels: Option<&BTreeMap<String, usize>>,
) -> Result<ParamValue, String> {
    if by_variable {
        return integer(arg).map(ParamValue::Variable);
    }
    match kind {
        ParamKind::I8 => integer(arg).map(ParamValue::I8),
        ParamKind::U8 => integer(arg).map(ParamValue::U8),
        ParamKind::I16 => integer(arg).map(ParamValue::I16),
        ParamKind::U16 => integer(arg).map(ParamValue::U16),
        ParamKind::I32 => match arg.as_str().and_then(|text| text.strip_prefix('@')) {
            Some(label) => resolve_label(label, labels).map(ParamValue::I32),
            None => integer(arg).map(ParamValue::I32),
        },
        ParamKind::U32 => integer(arg).map(ParamValue::U32),
        ParamKind::F32 => number(arg).map(ParamValue::F32),
        ParamKind::String => text(arg).map(ParamValue::String),
        ParamKind::List => {
            let items = arg
                .as_array()
                .ok_or_else(|| format!("expected a list, got {}", arg))?;
            items
                .iter()
                .map(list_element)
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::List)
        }
    }
}

fn resolve_label(label: &str, labels: Option<&BTreeMap<String, usize>>) -> Result<i32, String> {
    let Some(labels) = labels else {
        return Ok(0);
    };
    let offset = labels
        .get(label)
        .ok_or_else(|| format!("unknown label \"{}\"", label))?;
    i32::try_from(*offset).map_err(|_| format!("label \"{}\" is out of range", label))
}

fn integer<T: TryFrom<i64>>(arg: &Value) -> Result<T, String> {
    let value = arg
        .as_i64()
        .ok_or_else(|| format!("expected an integer, got {}", arg))?;
    T::try_from(value).map_err(|_| format!("{} is out of range", value))
}

fn number(arg: &Value) -> Result<f32, String> {
    arg.as_f64()
        .map(|value| value as f32)
        .ok_or_else(|| format!("expected a number, got {}", arg))
}

fn text(arg: &Value) -> Result<String, String> {
    arg.as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected a string, got {}", arg))
}

fn list_element(item: &Value) -> Result<ListElement, String> {
    let entry = item
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.iter().next())
        .map(|(key, value)| (key.as_str(), value))
        .ok_or_else(|| format!("list elements are single-key objects, got {}", item))?;
    match entry {
        ("int", value) => integer(value).map(ListElement::Int),
        ("float", value) => number(value).map(ListElement::Float),
        ("taggedInt", value) => integer(value).map(ListElement::TaggedInt),
        ("string", value) => text(value).map(ListElement::String),
        ("u16", value) => integer(value).map(ListElement::U16),
        (other, _) => Err(format!("unknown list element kind \"{}\"", other)),
    }
}

fn invalid(location: &str, message: impl Into<String>) -> SceToolError {
    SceToolError::InvalidPack {
        location: location.to_string(),
        message: message.into(),
    }
}
