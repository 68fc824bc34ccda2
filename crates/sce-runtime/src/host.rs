use std::collections::{BTreeSet, HashMap};

use sce_core::{Codepage, Command, ParamValue, ScriptSource, ScriptType};
use tracing::{debug, warn};

use crate::variables::VariableStore;
use crate::waiter::{TimedWaiter, Waiter};

/// Receives every command the interpreter does not execute itself.
pub trait CommandSink {
    fn dispatch(&mut self, command: &Command, context: &mut DispatchContext<'_>);
}

/// Drops every dispatched command.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardingSink;

impl CommandSink for DiscardingSink {
    fn dispatch(&mut self, _command: &Command, _context: &mut DispatchContext<'_>) {}
}

/// Where a command was decoded from.
#[derive(Debug, Clone, Copy)]
pub struct PatchContext<'a> {
    pub script_type: ScriptType,
    pub script_id: u32,
    pub description: &'a str,
    pub position: u64,
    pub codepage: Codepage,
}

/// Gives the host a chance to replace a decoded command before it runs.
pub trait CommandPatcher {
    fn try_patch(&self, context: &PatchContext<'_>, command: &Command) -> Option<Command>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommandPatches;

impl CommandPatcher for NoCommandPatches {
    fn try_patch(&self, _context: &PatchContext<'_>, _command: &Command) -> Option<Command> {
        None
    }
}

/// Replacements keyed by script type, script id and command position.
#[derive(Debug, Clone, Default)]
pub struct CommandPatchTable {
    entries: HashMap<(ScriptType, u32, u64), Command>,
}

impl CommandPatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        script_type: ScriptType,
        script_id: u32,
        position: u64,
        replacement: Command,
    ) -> Option<Command> {
        self.entries
            .insert((script_type, script_id, position), replacement)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CommandPatcher for CommandPatchTable {
    fn try_patch(&self, context: &PatchContext<'_>, command: &Command) -> Option<Command> {
        let replacement = self
            .entries
            .get(&(context.script_type, context.script_id, context.position))?;
        debug!(
            script_id = context.script_id,
            position = context.position,
            original = command.name,
            replacement = replacement.name,
            "command patched"
        );
        Some(replacement.clone())
    }
}

/// Read access to game state for the query opcodes.
pub trait GameStateQuery {
    fn inventory_contains_item(&self, item: i32) -> bool;
    fn team_contains_actor(&self, actor: i32) -> bool;
    fn dialogue_selection(&self) -> i32;
    fn favor(&self, actor: i32) -> i32;
    fn most_favorable_actor(&self) -> i32;
    fn scene_object_state(&self, object: i32) -> i32;
    fn money(&self) -> i32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGameState;

impl GameStateQuery for DefaultGameState {
    fn inventory_contains_item(&self, _item: i32) -> bool {
        false
    }

    fn team_contains_actor(&self, _actor: i32) -> bool {
        false
    }

    fn dialogue_selection(&self) -> i32 {
        0
    }

    fn favor(&self, _actor: i32) -> i32 {
        0
    }

    fn most_favorable_actor(&self) -> i32 {
        0
    }

    fn scene_object_state(&self, _object: i32) -> i32 {
        0
    }

    fn money(&self) -> i32 {
        0
    }
}

/// Start requests raised by sinks during a tick, applied by the manager afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptRequests {
    pub starts: Vec<(u32, ScriptType)>,
    /// Set when a scene script was injected with preemption.
    pub preempt: bool,
    /// Ids pending or running while the tick is in progress.
    pub active: BTreeSet<u32>,
}

impl ScriptRequests {
    pub fn with_active(active: impl IntoIterator<Item = u32>) -> Self {
        Self {
            active: active.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty() && !self.preempt
    }

    /// `true` when `id` is running or already requested this tick.
    pub fn is_claimed(&self, id: u32) -> bool {
        self.active.contains(&id) || self.starts.iter().any(|(start, _)| *start == id)
    }
}

/// Collaborators borrowed by a runner for one `update` call.
pub struct RunnerHost<'a> {
    pub sink: &'a mut dyn CommandSink,
    pub patcher: &'a dyn CommandPatcher,
    pub game_state: &'a dyn GameStateQuery,
    pub scene_source: Option<&'a dyn ScriptSource>,
    pub requests: &'a mut ScriptRequests,
}

/// What a sink may see and do while handling one command.
pub struct DispatchContext<'a> {
    pub(crate) script_id: u32,
    pub(crate) script_type: ScriptType,
    pub(crate) position: u64,
    pub(crate) variables: &'a VariableStore,
    pub(crate) waiters: &'a mut Vec<Box<dyn Waiter>>,
    pub(crate) scene_source: Option<&'a dyn ScriptSource>,
    pub(crate) requests: &'a mut ScriptRequests,
}

impl DispatchContext<'_> {
    pub fn script_id(&self) -> u32 {
        self.script_id
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    /// Byte offset of the command being dispatched.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn variable(&self, id: i16) -> i32 {
        self.variables.get(id)
    }

    /// Integer value of a slot, reading through variable references.
    pub fn resolve_i32(&self, value: &ParamValue) -> Option<i32> {
        match value {
            ParamValue::Variable(id) => Some(self.variables.get(*id)),
            literal => literal.as_i32(),
        }
    }

    /// Suspends the dispatching runner until `waiter` resolves.
    pub fn push_waiter<W: Waiter + 'static>(&mut self, waiter: W) {
        self.waiters.push(Box::new(waiter));
    }

    pub fn waiter_depth(&self) -> usize {
        self.waiters.len()
    }

    pub fn request_script(&mut self, id: u32, script_type: ScriptType) {
        self.requests.starts.push((id, script_type));
    }

    /// Starts the scene script matching `description`. With `preempt` the
    /// dispatching runner yields so the injected script runs first.
    ///
    /// `None` when nothing matches or when that script is already running or
    /// requested; the dispatching runner then keeps going without a waiter.
    pub fn inject_scene_script(&mut self, description: &str, preempt: bool) -> Option<u32> {
        let Some(block) = self
            .scene_source
            .and_then(|source| source.find_by_description(description))
        else {
            warn!(
                script_id = self.script_id,
                description, "no scene script matches injection"
            );
            return None;
        };
        if self.requests.is_claimed(block.id) {
            warn!(
                script_id = self.script_id,
                scene_id = block.id,
                description,
                "injected scene script is already active"
            );
            return None;
        }
        self.requests.starts.push((block.id, ScriptType::Scene));
        if preempt {
            self.waiters.push(Box::new(TimedWaiter::new(0.0)));
            self.requests.preempt = true;
        }
        Some(block.id)
    }
}
