use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::value::VarValue;

pub const DEFAULT_ITERATIONS: i32 = 2;

pub type Vars = FxHashMap<String, VarValue>;

/// Options for one expansion pass.
///
/// The variable bag and the frozen set are shared between a pass and the
/// nested passes it spawns; only the iteration counter and the encoding flag
/// differ per level.
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    vars: Arc<Vars>,
    pub iterations: i32,
    pub no_encode: bool,
    frozen_vars: Arc<FxHashSet<String>>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self::new(Vars::default(), DEFAULT_ITERATIONS, false)
    }
}

impl ExpansionOptions {
    pub fn new(vars: Vars, iterations: i32, no_encode: bool) -> Self {
        Self {
            vars: Arc::new(vars),
            iterations,
            no_encode,
            frozen_vars: Arc::new(FxHashSet::default()),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<VarValue>) -> Self {
        Arc::make_mut(&mut self.vars).insert(name.into(), value.into());
        self
    }

    /// Excludes `name` from substitution at every nesting level.
    pub fn freeze_var(&mut self, name: impl Into<String>) {
        Arc::make_mut(&mut self.frozen_vars).insert(name.into());
    }

    pub fn is_frozen(&self, name: &str) -> bool {
        self.frozen_vars.contains(name)
    }

    /// Missing variables read as the empty string.
    pub fn get_var(&self, name: &str) -> VarValue {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// The options for expanding a substituted value one level deeper.
    pub fn nested(&self) -> Self {
        Self {
            vars: Arc::clone(&self.vars),
            iterations: self.iterations - 1,
            no_encode: true,
            frozen_vars: Arc::clone(&self.frozen_vars),
        }
    }
}
