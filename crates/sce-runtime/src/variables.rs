use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sce_core::{GlobalVariableSnapshot, SceError, GLOBALS_SCHEMA_V1};
use tracing::debug;

use crate::rng::ScriptRng;

pub type SharedGlobals = Rc<RefCell<GlobalVariables>>;
pub type SharedRng = Rc<RefCell<ScriptRng>>;

pub fn is_global(id: i16) -> bool {
    id < 0
}

/// Variables with negative ids. Shared by every runner and visible to save state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalVariables {
    values: BTreeMap<i16, i32>,
}

impl GlobalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i16) -> i32 {
        self.values.get(&id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, id: i16, value: i32) {
        self.values.insert(id, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i16, i32)> + '_ {
        self.values.iter().map(|(id, value)| (*id, *value))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn snapshot(&self) -> GlobalVariableSnapshot {
        GlobalVariableSnapshot::new(self.values.clone())
    }

    /// Replaces the partition with the snapshot contents.
    pub fn restore(&mut self, snapshot: &GlobalVariableSnapshot) -> Result<(), SceError> {
        if snapshot.schema_version != GLOBALS_SCHEMA_V1 {
            return Err(SceError::new(
                "GLOBALS_SCHEMA",
                format!(
                    "Unsupported globals schema \"{}\", expected \"{}\".",
                    snapshot.schema_version, GLOBALS_SCHEMA_V1
                ),
            ));
        }
        if let Some(id) = snapshot.variables.keys().find(|id| !is_global(**id)) {
            return Err(SceError::new(
                "GLOBALS_ID_NOT_GLOBAL",
                format!("Variable {} in the snapshot is not a global id.", id),
            ));
        }
        self.values.clear();
        for (id, value) in &snapshot.variables {
            self.set(*id, *value);
        }
        Ok(())
    }
}

/// Per-runner view of the variable space: locals owned here, globals shared.
#[derive(Debug)]
pub struct VariableStore {
    globals: SharedGlobals,
    locals: BTreeMap<i16, i32>,
    rng: SharedRng,
}

impl VariableStore {
    pub fn new(globals: SharedGlobals, rng: SharedRng) -> Self {
        Self {
            globals,
            locals: BTreeMap::new(),
            rng,
        }
    }

    /// Standalone store with fresh globals, for tests and tools.
    pub fn detached(seed: u32) -> Self {
        Self::new(
            Rc::new(RefCell::new(GlobalVariables::new())),
            Rc::new(RefCell::new(ScriptRng::new(seed))),
        )
    }

    pub fn globals(&self) -> &SharedGlobals {
        &self.globals
    }

    pub fn get(&self, id: i16) -> i32 {
        if is_global(id) {
            self.globals.borrow().get(id)
        } else {
            self.locals.get(&id).copied().unwrap_or(0)
        }
    }

    pub fn set(&mut self, id: i16, value: i32) {
        if is_global(id) {
            debug!(id, value, "global variable written");
            self.globals.borrow_mut().set(id, value);
        } else {
            self.locals.insert(id, value);
        }
    }

    pub fn add(&mut self, id: i16, delta: i32) {
        let value = self.get(id).wrapping_add(delta);
        self.set(id, value);
    }

    /// Stores a value in `[0, exclusive_max)`; a non-positive max stores 0.
    pub fn set_random(&mut self, id: i16, exclusive_max: i32) {
        let value = self.rng.borrow_mut().roll(exclusive_max);
        self.set(id, value);
    }

    /// `a = |a - b|`, saturating at `i32::MAX`.
    pub fn absolute_difference(&mut self, a: i16, b: i16) {
        let difference = (i64::from(self.get(a)) - i64::from(self.get(b))).abs();
        self.set(a, i32::try_from(difference).unwrap_or(i32::MAX));
    }

    pub fn locals(&self) -> impl Iterator<Item = (i16, i32)> + '_ {
        self.locals.iter().map(|(id, value)| (*id, *value))
    }

    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }
}
