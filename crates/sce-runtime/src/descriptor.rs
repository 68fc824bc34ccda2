use std::collections::HashMap;
use std::sync::OnceLock;

use sce_core::SceError;

/// Wire type of one parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    /// `u16` byte count followed by codepage-encoded bytes.
    String,
    /// `u16` element count followed by tagged elements.
    List,
}

impl ParamKind {
    pub(crate) const COUNT: usize = 9;

    pub(crate) fn index(self) -> usize {
        match self {
            Self::I8 => 0,
            Self::U8 => 1,
            Self::I16 => 2,
            Self::U16 => 3,
            Self::I32 => 4,
            Self::U32 => 5,
            Self::F32 => 6,
            Self::String => 7,
            Self::List => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::String => "string",
            Self::List => "list",
        }
    }
}

/// Which game variant's command set a bytecode source was authored against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InstructionSet {
    #[default]
    Base,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub opcode: u16,
    pub name: &'static str,
    pub params: &'static [ParamKind],
}

const fn descriptor(
    opcode: u16,
    name: &'static str,
    params: &'static [ParamKind],
) -> CommandDescriptor {
    CommandDescriptor {
        opcode,
        name,
        params,
    }
}

/// Opcodes the interpreter executes itself. Shared by every instruction set.
pub mod op {
    pub const RUNNER_SET_EXECUTION_MODE: u16 = 1;
    pub const RUNNER_SET_OPERATOR: u16 = 2;
    pub const RUNNER_GOTO: u16 = 3;
    pub const RUNNER_GOTO_IF_FALSE: u16 = 4;
    pub const RUNNER_WAIT_UNTIL_TIME: u16 = 5;
    pub const VAR_SET_VALUE: u16 = 6;
    pub const VAR_ADD_VALUE: u16 = 7;
    pub const VAR_SET_RANDOM_VALUE: u16 = 8;
    pub const VAR_DISTRACT_ANOTHER_VAR: u16 = 9;
    pub const VAR_IS_GREATER_THAN: u16 = 10;
    pub const VAR_IS_GREATER_THAN_OR_EQUAL: u16 = 11;
    pub const VAR_IS_EQUAL: u16 = 12;
    pub const VAR_IS_NOT_EQUAL: u16 = 13;
    pub const VAR_IS_LESS_THAN: u16 = 14;
    pub const VAR_IS_LESS_THAN_OR_EQUAL: u16 = 15;
    pub const VAR_IS_IN_RANGE: u16 = 16;
    pub const VAR_IS_GREATER_THAN_ANOTHER_VAR: u16 = 17;
    pub const VAR_IS_GREATER_THAN_OR_EQUAL_ANOTHER_VAR: u16 = 18;
    pub const VAR_IS_EQUAL_ANOTHER_VAR: u16 = 19;
    pub const VAR_IS_NOT_EQUAL_ANOTHER_VAR: u16 = 20;
    pub const VAR_IS_LESS_THAN_ANOTHER_VAR: u16 = 21;
    pub const VAR_IS_LESS_THAN_OR_EQUAL_ANOTHER_VAR: u16 = 22;
    pub const INVENTORY_CONTAINS_ITEM: u16 = 23;
    pub const TEAM_CONTAINS_ACTOR: u16 = 24;
    pub const VAR_SET_DIALOGUE_SELECTION: u16 = 25;
    pub const VAR_SET_FAVOR: u16 = 26;
    pub const VAR_SET_MOST_FAVORABLE_ACTOR: u16 = 27;
    pub const VAR_SET_SCENE_OBJECT_STATE: u16 = 28;
    pub const VAR_SET_MONEY: u16 = 29;
}

use ParamKind::{List, String as Str, F32, I16, I32, I8, U16, U32, U8};

static SHARED_DESCRIPTORS: &[CommandDescriptor] = &[
    descriptor(op::RUNNER_SET_EXECUTION_MODE, "RunnerSetExecutionMode", &[I32]),
    descriptor(op::RUNNER_SET_OPERATOR, "RunnerSetOperator", &[I32]),
    descriptor(op::RUNNER_GOTO, "RunnerGoto", &[I32]),
    descriptor(op::RUNNER_GOTO_IF_FALSE, "RunnerGotoIfFalse", &[I32]),
    descriptor(op::RUNNER_WAIT_UNTIL_TIME, "RunnerWaitUntilTime", &[F32]),
    descriptor(op::VAR_SET_VALUE, "VarSetValue", &[I16, I32]),
    descriptor(op::VAR_ADD_VALUE, "VarAddValue", &[I16, I32]),
    descriptor(op::VAR_SET_RANDOM_VALUE, "VarSetRandomValue", &[I16, I32]),
    descriptor(op::VAR_DISTRACT_ANOTHER_VAR, "VarDistractAnotherVar", &[I16, I16]),
    descriptor(op::VAR_IS_GREATER_THAN, "VarIsGreaterThan", &[I16, I32]),
    descriptor(op::VAR_IS_GREATER_THAN_OR_EQUAL, "VarIsGreaterThanOrEqual", &[I16, I32]),
    descriptor(op::VAR_IS_EQUAL, "VarIsEqual", &[I16, I32]),
    descriptor(op::VAR_IS_NOT_EQUAL, "VarIsNotEqual", &[I16, I32]),
    descriptor(op::VAR_IS_LESS_THAN, "VarIsLessThan", &[I16, I32]),
    descriptor(op::VAR_IS_LESS_THAN_OR_EQUAL, "VarIsLessThanOrEqual", &[I16, I32]),
    descriptor(op::VAR_IS_IN_RANGE, "VarIsInRange", &[I16, I32, I32]),
    descriptor(op::VAR_IS_GREATER_THAN_ANOTHER_VAR, "VarIsGreaterThanAnotherVar", &[I16, I16]),
    descriptor(
        op::VAR_IS_GREATER_THAN_OR_EQUAL_ANOTHER_VAR,
        "VarIsGreaterThanOrEqualAnotherVar",
        &[I16, I16],
    ),
    descriptor(op::VAR_IS_EQUAL_ANOTHER_VAR, "VarIsEqualAnotherVar", &[I16, I16]),
    descriptor(op::VAR_IS_NOT_EQUAL_ANOTHER_VAR, "VarIsNotEqualAnotherVar", &[I16, I16]),
    descriptor(op::VAR_IS_LESS_THAN_ANOTHER_VAR, "VarIsLessThanAnotherVar", &[I16, I16]),
    descriptor(
        op::VAR_IS_LESS_THAN_OR_EQUAL_ANOTHER_VAR,
        "VarIsLessThanOrEqualAnotherVar",
        &[I16, I16],
    ),
    descriptor(op::INVENTORY_CONTAINS_ITEM, "InventoryContainsItem", &[I32]),
    descriptor(op::TEAM_CONTAINS_ACTOR, "TeamContainsActor", &[I32]),
    descriptor(op::VAR_SET_DIALOGUE_SELECTION, "VarSetDialogueSelection", &[I16]),
    descriptor(op::VAR_SET_FAVOR, "VarSetFavor", &[I16, I32]),
    descriptor(op::VAR_SET_MOST_FAVORABLE_ACTOR, "VarSetMostFavorableActor", &[I16]),
    descriptor(op::VAR_SET_SCENE_OBJECT_STATE, "VarSetSceneObjectState", &[I16, I32]),
    descriptor(op::VAR_SET_MONEY, "VarSetMoney", &[I16]),
    // Everything below is forwarded to the game untouched.
    descriptor(40, "DialogueRenderText", &[Str]),
    descriptor(41, "DialogueRenderTextWithTimeLimit", &[Str, F32]),
    descriptor(42, "DialogueAddSelections", &[List]),
    descriptor(43, "DialogueRenderActorAvatar", &[I32, Str]),
    descriptor(44, "ActorMoveTo", &[I32, I32, I32, I32]),
    descriptor(46, "ActorPerformAction", &[I32, Str, I32]),
    descriptor(47, "ActorShowEmoji", &[I32, U8]),
    descriptor(48, "ActorActivate", &[I32, I32]),
    descriptor(49, "ActorSetYPosition", &[I32, F32]),
    descriptor(50, "CameraFadeIn", &[]),
    descriptor(51, "CameraFadeOut", &[]),
    descriptor(52, "CameraSetTransform", &[F32, F32, F32, F32, F32, F32]),
    descriptor(53, "CameraShake", &[F32, F32, I8]),
    descriptor(54, "PlaySfx", &[Str, I32]),
    descriptor(55, "PlayMusic", &[Str, I32]),
    descriptor(56, "StopMusic", &[]),
    descriptor(57, "InventoryAddItem", &[I32, I32]),
    descriptor(58, "InventoryRemoveItem", &[I32]),
    descriptor(59, "TeamAddActor", &[I32]),
    descriptor(60, "TeamRemoveActor", &[I32]),
    descriptor(61, "SceneLoad", &[Str, Str]),
    descriptor(62, "SceneActivateObject", &[I32, I32]),
    descriptor(63, "SceneExecuteScript", &[Str]),
    descriptor(64, "FavorAdd", &[I32, I32]),
    descriptor(65, "MoneyAdd", &[I32]),
    descriptor(66, "UiShowMessage", &[Str]),
    descriptor(67, "EffectPlay", &[U32, U16]),
    descriptor(68, "GameSwitchToMainMenu", &[]),
];

static BASE_DESCRIPTORS: &[CommandDescriptor] = &[descriptor(45, "ActorSetFacing", &[I32, I32])];

static EXTENDED_DESCRIPTORS: &[CommandDescriptor] = &[
    descriptor(45, "ActorSetFacing", &[I32, I32, F32]),
    descriptor(70, "ActorEnableGravity", &[I32, I32]),
    descriptor(71, "CameraOrbit", &[F32, F32, F32, I32]),
    descriptor(72, "TreasureBoxOpen", &[I32, List]),
];

/// Opcode → descriptor mapping for one instruction set.
#[derive(Debug)]
pub struct DescriptorTable {
    instruction_set: InstructionSet,
    by_opcode: HashMap<u16, &'static CommandDescriptor>,
    by_name: HashMap<&'static str, &'static CommandDescriptor>,
}

impl DescriptorTable {
    /// Built on first use and shared for the rest of the process.
    pub fn for_instruction_set(instruction_set: InstructionSet) -> &'static Self {
        static BASE: OnceLock<DescriptorTable> = OnceLock::new();
        static EXTENDED: OnceLock<DescriptorTable> = OnceLock::new();
        match instruction_set {
            InstructionSet::Base => BASE.get_or_init(|| Self::build(instruction_set)),
            InstructionSet::Extended => EXTENDED.get_or_init(|| Self::build(instruction_set)),
        }
    }

    fn build(instruction_set: InstructionSet) -> Self {
        let variant = match instruction_set {
            InstructionSet::Base => BASE_DESCRIPTORS,
            InstructionSet::Extended => EXTENDED_DESCRIPTORS,
        };
        let mut by_opcode = HashMap::new();
        let mut by_name = HashMap::new();
        for descriptor in SHARED_DESCRIPTORS.iter().chain(variant.iter()) {
            by_opcode.insert(descriptor.opcode, descriptor);
            by_name.insert(descriptor.name, descriptor);
        }
        Self {
            instruction_set,
            by_opcode,
            by_name,
        }
    }

    pub fn instruction_set(&self) -> InstructionSet {
        self.instruction_set
    }

    pub fn get(&self, opcode: u16) -> Option<&'static CommandDescriptor> {
        self.by_opcode.get(&opcode).copied()
    }

    pub fn lookup(&self, opcode: u16) -> Result<&'static CommandDescriptor, SceError> {
        self.get(opcode).ok_or_else(|| {
            SceError::new(
                "DECODE_OPCODE_UNKNOWN",
                format!(
                    "Opcode {} is not mapped in the {:?} instruction set.",
                    opcode, self.instruction_set
                ),
            )
        })
    }

    pub fn by_name(&self, name: &str) -> Option<&'static CommandDescriptor> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }

    /// Descriptors ordered by opcode.
    pub fn descriptors(&self) -> Vec<&'static CommandDescriptor> {
        let mut descriptors = self.by_opcode.values().copied().collect::<Vec<_>>();
        descriptors.sort_by_key(|descriptor| descriptor.opcode);
        descriptors
    }
}

#[cfg(test)]
mod descriptor_tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tables_have_unique_opcodes_and_names_within_mask_width() {
        for instruction_set in [InstructionSet::Base, InstructionSet::Extended] {
            let shared_and_variant = SHARED_DESCRIPTORS.iter().chain(match instruction_set {
                InstructionSet::Base => BASE_DESCRIPTORS.iter(),
                InstructionSet::Extended => EXTENDED_DESCRIPTORS.iter(),
            });
            let mut opcodes = HashSet::new();
            let mut names = HashSet::new();
            for descriptor in shared_and_variant {
                assert!(opcodes.insert(descriptor.opcode), "{}", descriptor.name);
                assert!(names.insert(descriptor.name), "{}", descriptor.name);
                assert!(descriptor.params.len() <= 16, "{}", descriptor.name);
            }
            let table = DescriptorTable::for_instruction_set(instruction_set);
            assert_eq!(table.len(), opcodes.len());
        }
    }

    #[test]
    fn instruction_sets_share_vm_opcodes_and_diverge_on_variant_commands() {
        let base = DescriptorTable::for_instruction_set(InstructionSet::Base);
        let extended = DescriptorTable::for_instruction_set(InstructionSet::Extended);

        for opcode in op::RUNNER_SET_EXECUTION_MODE..=op::VAR_SET_MONEY {
            assert_eq!(base.get(opcode), extended.get(opcode));
        }

        let base_facing = base.by_name("ActorSetFacing").expect("base facing");
        let extended_facing = extended.by_name("ActorSetFacing").expect("extended facing");
        assert_eq!(base_facing.opcode, extended_facing.opcode);
        assert_eq!(base_facing.params.len(), 2);
        assert_eq!(extended_facing.params.len(), 3);

        assert!(base.get(70).is_none());
        assert_eq!(extended.get(70).map(|d| d.name), Some("ActorEnableGravity"));
    }

    #[test]
    fn lookup_reports_unknown_opcode() {
        let table = DescriptorTable::for_instruction_set(InstructionSet::Base);
        let error = table.lookup(999).expect_err("opcode 999 is unmapped");
        assert_eq!(error.code, "DECODE_OPCODE_UNKNOWN");
        assert_eq!(table.instruction_set(), InstructionSet::Base);
    }

    #[test]
    fn table_is_built_once_per_instruction_set() {
        let first = DescriptorTable::for_instruction_set(InstructionSet::Extended);
        let second = DescriptorTable::for_instruction_set(InstructionSet::Extended);
        assert!(std::ptr::eq(first, second));

        let opcodes = first
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.opcode)
            .collect::<Vec<_>>();
        let mut sorted = opcodes.clone();
        sorted.sort_unstable();
        assert_eq!(opcodes, sorted);
    }
}
