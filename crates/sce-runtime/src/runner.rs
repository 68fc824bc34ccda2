use std::sync::Arc;

use sce_core::{
    Codepage, Command, ConditionOperator, ExecutionMode, ParamValue, SceError, ScriptBlock,
    ScriptType,
};
use tracing::trace;

use crate::decoder::decode_next;
use crate::descriptor::{op, DescriptorTable};
use crate::host::{DispatchContext, PatchContext, RunnerHost};
use crate::reader::ByteReader;
use crate::variables::VariableStore;
use crate::waiter::{TimedWaiter, Waiter};

type Comparison = fn(&i32, &i32) -> bool;

/// Comparison opcodes: the test and whether slot 1 names a second variable.
fn comparison(opcode: u16) -> Option<(Comparison, bool)> {
    let entry: (Comparison, bool) = match opcode {
        op::VAR_IS_GREATER_THAN => (i32::gt, false),
        op::VAR_IS_GREATER_THAN_OR_EQUAL => (i32::ge, false),
        op::VAR_IS_EQUAL => (i32::eq, false),
        op::VAR_IS_NOT_EQUAL => (i32::ne, false),
        op::VAR_IS_LESS_THAN => (i32::lt, false),
        op::VAR_IS_LESS_THAN_OR_EQUAL => (i32::le, false),
        op::VAR_IS_GREATER_THAN_ANOTHER_VAR => (i32::gt, true),
        op::VAR_IS_GREATER_THAN_OR_EQUAL_ANOTHER_VAR => (i32::ge, true),
        op::VAR_IS_EQUAL_ANOTHER_VAR => (i32::eq, true),
        op::VAR_IS_NOT_EQUAL_ANOTHER_VAR => (i32::ne, true),
        op::VAR_IS_LESS_THAN_ANOTHER_VAR => (i32::lt, true),
        op::VAR_IS_LESS_THAN_OR_EQUAL_ANOTHER_VAR => (i32::le, true),
        _ => return None,
    };
    Some(entry)
}

/// Read-only view of a runner's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerState {
    pub cursor: usize,
    pub len: usize,
    pub mode: ExecutionMode,
    pub operator: ConditionOperator,
    pub accumulator: bool,
    pub waiter_depth: usize,
    pub disposed: bool,
}

/// Interprets one script block.
#[derive(Debug)]
pub struct ScriptRunner {
    id: u32,
    script_type: ScriptType,
    description: String,
    codepage: Codepage,
    bytecode: Option<Arc<[u8]>>,
    cursor: usize,
    table: &'static DescriptorTable,
    mode: ExecutionMode,
    operator: ConditionOperator,
    accumulator: bool,
    waiters: Vec<Box<dyn Waiter>>,
    variables: VariableStore,
}

impl ScriptRunner {
    pub fn new(
        block: &ScriptBlock,
        script_type: ScriptType,
        table: &'static DescriptorTable,
        mode: ExecutionMode,
        variables: VariableStore,
    ) -> Self {
        Self {
            id: block.id,
            script_type,
            description: block.description.clone(),
            codepage: block.codepage,
            bytecode: Some(block.bytecode.clone()),
            cursor: 0,
            table,
            mode,
            operator: ConditionOperator::Assign,
            accumulator: true,
            waiters: Vec::new(),
            variables,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn is_disposed(&self) -> bool {
        self.bytecode.is_none()
    }

    pub fn state(&self) -> RunnerState {
        RunnerState {
            cursor: self.cursor,
            len: self.len(),
            mode: self.mode,
            operator: self.operator,
            accumulator: self.accumulator,
            waiter_depth: self.waiters.len(),
            disposed: self.is_disposed(),
        }
    }

    fn len(&self) -> usize {
        self.bytecode.as_ref().map_or(0, |bytes| bytes.len())
    }

    /// Advances the script by one tick. `Ok(false)` once the stream is
    /// exhausted with no waiter left, or after disposal.
    pub fn update(&mut self, delta_time: f32, host: &mut RunnerHost<'_>) -> Result<bool, SceError> {
        if self.is_disposed() {
            return Ok(false);
        }

        if let Some(waiter) = self.waiters.last_mut() {
            if waiter.should_wait(delta_time) {
                return Ok(true);
            }
            self.waiters.pop();
        }

        if self.waiters.is_empty() {
            while self.cursor < self.len() {
                self.execute_next(host)?;
                if self.mode == ExecutionMode::Asynchronous || !self.waiters.is_empty() {
                    break;
                }
            }
        }

        Ok(self.cursor < self.len() || !self.waiters.is_empty())
    }

    /// Releases the bytecode, waiters and locals. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.bytecode = None;
        self.waiters.clear();
        self.variables.clear_locals();
    }

    fn execute_next(&mut self, host: &mut RunnerHost<'_>) -> Result<(), SceError> {
        let Some(bytecode) = self.bytecode.clone() else {
            return Ok(());
        };
        let position = self.cursor;
        let mut reader = ByteReader::at(&bytecode, position)?;
        let decoded = decode_next(&mut reader, self.table, self.codepage)?;
        self.cursor = reader.position();

        let patch_context = PatchContext {
            script_type: self.script_type,
            script_id: self.id,
            description: &self.description,
            position: position as u64,
            codepage: self.codepage,
        };
        let command = host
            .patcher
            .try_patch(&patch_context, &decoded)
            .unwrap_or(decoded);
        trace!(
            script_id = self.id,
            position,
            command = command.name,
            "executing command"
        );

        self.process(&command, position as u64, host)
            .map_err(|error| error.with_position(position as u64))
    }

    fn process(
        &mut self,
        command: &Command,
        position: u64,
        host: &mut RunnerHost<'_>,
    ) -> Result<(), SceError> {
        match command.opcode {
            op::RUNNER_SET_EXECUTION_MODE => {
                let code = self.int_arg(command, 0)?;
                self.mode = ExecutionMode::from_code(code).ok_or_else(|| {
                    SceError::new(
                        "RUNNER_EXECUTION_MODE_UNKNOWN",
                        format!("Execution mode {} is not recognised.", code),
                    )
                })?;
            }
            op::RUNNER_SET_OPERATOR => {
                let code = self.int_arg(command, 0)?;
                self.operator = ConditionOperator::from_code(code).ok_or_else(|| {
                    SceError::new(
                        "RUNNER_OPERATOR_UNKNOWN",
                        format!("Condition operator {} is not recognised.", code),
                    )
                })?;
            }
            op::RUNNER_GOTO => {
                let offset = self.int_arg(command, 0)?;
                self.seek(offset)?;
            }
            op::RUNNER_GOTO_IF_FALSE => {
                let offset = self.int_arg(command, 0)?;
                if !self.accumulator {
                    self.seek(offset)?;
                }
            }
            op::RUNNER_WAIT_UNTIL_TIME => {
                let seconds = self.float_arg(command, 0)?;
                self.waiters.push(Box::new(TimedWaiter::new(seconds)));
            }
            op::VAR_SET_VALUE => {
                let id = self.var_id_arg(command, 0)?;
                let value = self.int_arg(command, 1)?;
                self.variables.set(id, value);
            }
            op::VAR_ADD_VALUE => {
                let id = self.var_id_arg(command, 0)?;
                let delta = self.int_arg(command, 1)?;
                self.variables.add(id, delta);
            }
            op::VAR_SET_RANDOM_VALUE => {
                let id = self.var_id_arg(command, 0)?;
                let max = self.int_arg(command, 1)?;
                self.variables.set_random(id, max);
            }
            op::VAR_DISTRACT_ANOTHER_VAR => {
                let id = self.var_id_arg(command, 0)?;
                let other = self.var_id_arg(command, 1)?;
                self.variables.absolute_difference(id, other);
            }
            op::VAR_IS_IN_RANGE => {
                let value = self.variables.get(self.var_id_arg(command, 0)?);
                let min = self.int_arg(command, 1)?;
                let max = self.int_arg(command, 2)?;
                self.fold((min..=max).contains(&value));
            }
            op::INVENTORY_CONTAINS_ITEM => {
                let item = self.int_arg(command, 0)?;
                self.fold(host.game_state.inventory_contains_item(item));
            }
            op::TEAM_CONTAINS_ACTOR => {
                let actor = self.int_arg(command, 0)?;
                self.fold(host.game_state.team_contains_actor(actor));
            }
            op::VAR_SET_DIALOGUE_SELECTION => {
                let id = self.var_id_arg(command, 0)?;
                self.variables.set(id, host.game_state.dialogue_selection());
            }
            op::VAR_SET_FAVOR => {
                let id = self.var_id_arg(command, 0)?;
                let actor = self.int_arg(command, 1)?;
                self.variables.set(id, host.game_state.favor(actor));
            }
            op::VAR_SET_MOST_FAVORABLE_ACTOR => {
                let id = self.var_id_arg(command, 0)?;
                self.variables.set(id, host.game_state.most_favorable_actor());
            }
            op::VAR_SET_SCENE_OBJECT_STATE => {
                let id = self.var_id_arg(command, 0)?;
                let object = self.int_arg(command, 1)?;
                self.variables.set(id, host.game_state.scene_object_state(object));
            }
            op::VAR_SET_MONEY => {
                let id = self.var_id_arg(command, 0)?;
                self.variables.set(id, host.game_state.money());
            }
            opcode => match comparison(opcode) {
                Some((compare, against_variable)) => {
                    let lhs = self.variables.get(self.var_id_arg(command, 0)?);
                    let rhs = if against_variable {
                        self.variables.get(self.var_id_arg(command, 1)?)
                    } else {
                        self.int_arg(command, 1)?
                    };
                    self.fold(compare(&lhs, &rhs));
                }
                None => self.dispatch(command, position, host),
            },
        }
        Ok(())
    }

    fn dispatch(&mut self, command: &Command, position: u64, host: &mut RunnerHost<'_>) {
        let mut context = DispatchContext {
            script_id: self.id,
            script_type: self.script_type,
            position,
            variables: &self.variables,
            waiters: &mut self.waiters,
            scene_source: host.scene_source,
            requests: &mut *host.requests,
        };
        host.sink.dispatch(command, &mut context);
    }

    fn fold(&mut self, value: bool) {
        self.accumulator = self.operator.combine(value, self.accumulator);
    }

    fn seek(&mut self, offset: i32) -> Result<(), SceError> {
        let len = self.len();
        let target = usize::try_from(offset)
            .ok()
            .filter(|target| *target <= len)
            .ok_or_else(|| {
                SceError::new(
                    "RUNNER_SEEK_OUT_OF_RANGE",
                    format!("Jump target {} is outside a block of {} bytes.", offset, len),
                )
            })?;
        self.cursor = target;
        Ok(())
    }

    fn int_arg(&self, command: &Command, slot: usize) -> Result<i32, SceError> {
        match command.param(slot) {
            Some(ParamValue::Variable(id)) => Ok(self.variables.get(*id)),
            Some(value) => value
                .as_i32()
                .ok_or_else(|| param_invalid(command, slot, "an integer")),
            None => Err(param_invalid(command, slot, "an integer")),
        }
    }

    fn float_arg(&self, command: &Command, slot: usize) -> Result<f32, SceError> {
        match command.param(slot) {
            Some(ParamValue::Variable(id)) => Ok(self.variables.get(*id) as f32),
            Some(value) => value
                .as_f32()
                .ok_or_else(|| param_invalid(command, slot, "a number")),
            None => Err(param_invalid(command, slot, "a number")),
        }
    }

    /// A variable id slot means the id itself, whether literal or flagged.
    fn var_id_arg(&self, command: &Command, slot: usize) -> Result<i16, SceError> {
        match command.param(slot) {
            Some(ParamValue::Variable(id)) => Ok(*id),
            Some(value) => value
                .as_i32()
                .and_then(|id| i16::try_from(id).ok())
                .ok_or_else(|| param_invalid(command, slot, "a variable id")),
            None => Err(param_invalid(command, slot, "a variable id")),
        }
    }
}

fn param_invalid(command: &Command, slot: usize, expected: &str) -> SceError {
    SceError::new(
        "RUNNER_PARAM_INVALID",
        format!("{} slot {} must be {}.", command.name, slot, expected),
    )
}
