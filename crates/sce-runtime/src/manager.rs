use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

use sce_core::{ExecutionMode, GlobalVariableSnapshot, SceError, ScriptEvent, ScriptSource, ScriptType};
use tracing::{debug, error, warn};

use crate::descriptor::{DescriptorTable, InstructionSet};
use crate::host::{
    CommandPatcher, CommandSink, DefaultGameState, GameStateQuery, NoCommandPatches, RunnerHost,
    ScriptRequests,
};
use crate::rng::ScriptRng;
use crate::runner::ScriptRunner;
use crate::variables::{GlobalVariables, SharedGlobals, SharedRng, VariableStore};

/// Delta time used for the extra pass that follows a preempting injection.
pub const PREEMPT_PASS_DELTA_TIME: f32 = 1.0;

pub struct ScriptManagerOptions {
    pub instruction_set: InstructionSet,
    pub default_execution_mode: ExecutionMode,
    pub random_seed: u32,
    pub system_source: Box<dyn ScriptSource>,
    pub world_map_source: Option<Box<dyn ScriptSource>>,
    pub scene_source: Option<Box<dyn ScriptSource>>,
    pub sink: Box<dyn CommandSink>,
    pub patcher: Option<Box<dyn CommandPatcher>>,
    pub game_state: Option<Box<dyn GameStateQuery>>,
}

impl ScriptManagerOptions {
    pub fn new(
        system_source: impl ScriptSource + 'static,
        sink: impl CommandSink + 'static,
    ) -> Self {
        Self {
            instruction_set: InstructionSet::default(),
            default_execution_mode: ExecutionMode::default(),
            random_seed: 0,
            system_source: Box::new(system_source),
            world_map_source: None,
            scene_source: None,
            sink: Box::new(sink),
            patcher: None,
            game_state: None,
        }
    }
}

/// Schedules script runners against the per-frame tick.
pub struct ScriptManager {
    table: &'static DescriptorTable,
    default_execution_mode: ExecutionMode,
    system_source: Box<dyn ScriptSource>,
    world_map_source: Option<Box<dyn ScriptSource>>,
    scene_source: Option<Box<dyn ScriptSource>>,
    sink: Box<dyn CommandSink>,
    patcher: Box<dyn CommandPatcher>,
    game_state: Box<dyn GameStateQuery>,
    globals: SharedGlobals,
    rng: SharedRng,
    pending: VecDeque<ScriptRunner>,
    running: Vec<ScriptRunner>,
    events: Vec<ScriptEvent>,
}

impl ScriptManager {
    pub fn new(options: ScriptManagerOptions) -> Self {
        Self {
            table: DescriptorTable::for_instruction_set(options.instruction_set),
            default_execution_mode: options.default_execution_mode,
            system_source: options.system_source,
            world_map_source: options.world_map_source,
            scene_source: options.scene_source,
            sink: options.sink,
            patcher: options
                .patcher
                .unwrap_or_else(|| Box::new(NoCommandPatches)),
            game_state: options
                .game_state
                .unwrap_or_else(|| Box::new(DefaultGameState)),
            globals: Rc::new(RefCell::new(GlobalVariables::new())),
            rng: Rc::new(RefCell::new(ScriptRng::new(options.random_seed))),
            pending: VecDeque::new(),
            running: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn instruction_set(&self) -> InstructionSet {
        self.table.instruction_set()
    }

    pub fn set_world_map_source(&mut self, source: impl ScriptSource + 'static) {
        self.world_map_source = Some(Box::new(source));
    }

    pub fn set_scene_source(&mut self, source: impl ScriptSource + 'static) {
        self.scene_source = Some(Box::new(source));
    }

    fn source(&self, script_type: ScriptType) -> Result<&dyn ScriptSource, SceError> {
        let source = match script_type {
            ScriptType::System => Some(self.system_source.as_ref()),
            ScriptType::WorldMap => self.world_map_source.as_deref(),
            ScriptType::Scene => self.scene_source.as_deref(),
        };
        source.ok_or_else(|| {
            SceError::new(
                "MANAGER_SOURCE_MISSING",
                format!("No {} script source is loaded.", script_type),
            )
        })
    }

    /// Queues script `id`. `Ok(false)` when an instance is already pending or
    /// running; `Err` when the block cannot be found.
    pub fn try_add_script(&mut self, id: u32, script_type: ScriptType) -> Result<bool, SceError> {
        if self.is_active(id) {
            warn!(id, %script_type, "script is already pending or running");
            self.events.push(ScriptEvent::FailedToRun {
                id,
                script_type,
                error: SceError::new(
                    "MANAGER_SCRIPT_ALREADY_ACTIVE",
                    format!("Script {} is already pending or running.", id),
                ),
            });
            return Ok(false);
        }

        let block = self.source(script_type)?.script(id).ok_or_else(|| {
            SceError::new(
                "MANAGER_SCRIPT_NOT_FOUND",
                format!("Script {} is not in the {} source.", id, script_type),
            )
        })?;
        let runner = ScriptRunner::new(
            block,
            script_type,
            self.table,
            self.default_execution_mode,
            VariableStore::new(self.globals.clone(), self.rng.clone()),
        );
        debug!(id, %script_type, description = runner.description(), "script queued");
        self.pending.push_back(runner);
        Ok(true)
    }

    /// Queues the scene script whose description matches. Nothing is mid-tick
    /// here, so `preempt` only reorders: the script is promoted ahead of every
    /// running one on the next update either way.
    pub fn add_scene_script(
        &mut self,
        description: &str,
        preempt: bool,
    ) -> Result<Option<u32>, SceError> {
        let Some(id) = self
            .source(ScriptType::Scene)?
            .find_by_description(description)
            .map(|block| block.id)
        else {
            warn!(description, "no scene script matches description");
            return Ok(None);
        };
        debug!(id, description, preempt, "scene script requested");
        Ok(self.try_add_script(id, ScriptType::Scene)?.then_some(id))
    }

    /// Runs one frame. A preempting injection triggers extra passes at
    /// [`PREEMPT_PASS_DELTA_TIME`] until none is requested.
    pub fn update(&mut self, delta_time: f32) {
        let mut delta_time = delta_time;
        while self.tick(delta_time) {
            delta_time = PREEMPT_PASS_DELTA_TIME;
        }
    }

    fn tick(&mut self, delta_time: f32) -> bool {
        while let Some(runner) = self.pending.pop_front() {
            debug!(id = runner.id(), "script promoted to running");
            self.running.insert(0, runner);
        }

        let mut requests = ScriptRequests::with_active(self.running.iter().map(ScriptRunner::id));
        let mut retired = Vec::new();
        let mut kept = Vec::with_capacity(self.running.len());
        let running = mem::take(&mut self.running);
        {
            let mut host = RunnerHost {
                sink: self.sink.as_mut(),
                patcher: self.patcher.as_ref(),
                game_state: self.game_state.as_ref(),
                scene_source: self.scene_source.as_deref(),
                requests: &mut requests,
            };
            for mut runner in running {
                let outcome = runner.update(delta_time, &mut host);
                if !matches!(outcome, Ok(true)) {
                    host.requests.active.remove(&runner.id());
                }
                match outcome {
                    Ok(true) => kept.push(runner),
                    Ok(false) => retired.push((runner, None)),
                    Err(error) => retired.push((runner, Some(error))),
                }
            }
        }
        self.running = kept;

        for (mut runner, failure) in retired {
            runner.dispose();
            let id = runner.id();
            let script_type = runner.script_type();
            match failure {
                None => {
                    debug!(id, %script_type, "script finished");
                    self.events.push(ScriptEvent::Finished { id, script_type });
                }
                Some(error) => {
                    error!(id, %script_type, %error, "script failed");
                    self.events.push(ScriptEvent::FailedToRun {
                        id,
                        script_type,
                        error,
                    });
                }
            }
        }

        for (id, script_type) in requests.starts {
            if let Err(error) = self.try_add_script(id, script_type) {
                error!(id, %script_type, %error, "requested script could not start");
                self.events.push(ScriptEvent::FailedToRun {
                    id,
                    script_type,
                    error,
                });
            }
        }

        requests.preempt
    }

    /// Disposes every pending and running script and clears the globals.
    pub fn reset(&mut self) {
        for mut runner in self.pending.drain(..).chain(self.running.drain(..)) {
            runner.dispose();
        }
        self.globals.borrow_mut().clear();
        debug!("script manager reset");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn has_active_scripts(&self) -> bool {
        !self.pending.is_empty() || !self.running.is_empty()
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.runner(id).is_some()
    }

    pub fn runner(&self, id: u32) -> Option<&ScriptRunner> {
        self.running
            .iter()
            .chain(self.pending.iter())
            .find(|runner| runner.id() == id)
    }

    /// Running scripts in update order.
    pub fn running(&self) -> impl Iterator<Item = &ScriptRunner> {
        self.running.iter()
    }

    pub fn drain_events(&mut self) -> Vec<ScriptEvent> {
        mem::take(&mut self.events)
    }

    pub fn globals(&self) -> SharedGlobals {
        self.globals.clone()
    }

    pub fn export_globals(&self) -> GlobalVariableSnapshot {
        self.globals.borrow().snapshot()
    }

    pub fn import_globals(&mut self, snapshot: &GlobalVariableSnapshot) -> Result<(), SceError> {
        self.globals.borrow_mut().restore(snapshot)
    }
}
