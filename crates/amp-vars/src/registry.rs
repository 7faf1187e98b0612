use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use strum::IntoEnumIterator;

use crate::builtin::BuiltinMacro;
use crate::config::AssertionMode;
use crate::element::{ElementContext, ElementMacro};
use crate::error::{Error, Result};
use crate::services::Services;
use crate::value::MacroResult;

pub type Bindings = FxHashMap<String, Binding>;
pub type Allowlist = FxHashSet<String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamNum {
    None,
    Fixed(u8),
    Range(u8, u8),
    Any,
}

impl ParamNum {
    /// Arguments a call cannot do without.
    pub fn required(&self) -> u8 {
        match self {
            ParamNum::None | ParamNum::Any => 0,
            ParamNum::Fixed(n) => *n,
            ParamNum::Range(min, _) => *min,
        }
    }

    /// Arguments past this count are dropped.
    pub fn max(&self) -> Option<u8> {
        match self {
            ParamNum::None => Some(0),
            ParamNum::Fixed(n) | ParamNum::Range(_, n) => Some(*n),
            ParamNum::Any => None,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self, num_args: u8) -> bool {
        match self {
            ParamNum::None => num_args == 0,
            ParamNum::Fixed(n) => num_args == *n,
            ParamNum::Range(min, max) => num_args >= *min && num_args <= *max,
            ParamNum::Any => true,
        }
    }
}

impl fmt::Display for ParamNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamNum::None => write!(f, "0"),
            ParamNum::Fixed(n) => write!(f, "{}", n),
            ParamNum::Range(min, max) => write!(f, "{}..={}", min, max),
            ParamNum::Any => write!(f, "any"),
        }
    }
}

type CustomFn = dyn Fn(&[String]) -> Result<MacroResult> + Send + Sync;

/// A user-registered macro.
#[derive(Clone)]
pub struct MacroFn {
    pub num_params: ParamNum,
    func: Arc<CustomFn>,
}

impl MacroFn {
    pub fn new<F>(num_params: ParamNum, func: F) -> Self
    where
        F: Fn(&[String]) -> Result<MacroResult> + Send + Sync + 'static,
    {
        Self {
            num_params,
            func: Arc::new(func),
        }
    }

    pub fn call(&self, args: &[String]) -> Result<MacroResult> {
        (self.func)(args)
    }
}

impl fmt::Debug for MacroFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroFn")
            .field("num_params", &self.num_params)
            .finish_non_exhaustive()
    }
}

/// What a macro name resolves to.
#[derive(Clone, Debug)]
pub enum Binding {
    Builtin(BuiltinMacro),
    Element(ElementMacro, Arc<ElementContext>),
    Custom(MacroFn),
    Value(String),
}

impl Binding {
    pub fn num_params(&self) -> ParamNum {
        match self {
            Binding::Builtin(m) => m.num_params(),
            Binding::Element(m, _) => m.num_params(),
            Binding::Custom(f) => f.num_params,
            Binding::Value(_) => ParamNum::Any,
        }
    }

    /// Calls the macro. Only a missing required argument fails. Arguments
    /// past the declared maximum are dropped.
    pub fn invoke(&self, name: &str, services: &Services, args: &[String]) -> Result<MacroResult> {
        let num_params = self.num_params();
        let num_args = u8::try_from(args.len()).unwrap_or(u8::MAX);

        if num_args < num_params.required() {
            return Err(Error::InvalidNumberOfArguments(
                name.to_string(),
                num_params,
                num_args,
            ));
        }

        let args = match num_params.max() {
            Some(max) if !num_params.is_valid(num_args) => {
                tracing::debug!(
                    "Ignoring extra arguments to \"{}\", expected {}, got {}",
                    name,
                    num_params,
                    num_args
                );
                &args[..usize::from(max)]
            }
            _ => args,
        };

        match self {
            Binding::Builtin(m) => m.invoke(services, args),
            Binding::Element(m, element) => m.invoke(element, args),
            Binding::Custom(f) => f.call(args),
            Binding::Value(value) => Ok(value.as_str().into()),
        }
    }
}

/// The macro table of one service instance. Names are registered once and
/// never removed.
#[derive(Clone, Debug)]
pub struct MacroRegistry {
    macros: Bindings,
    mode: AssertionMode,
}

impl MacroRegistry {
    pub fn new(mode: AssertionMode) -> Self {
        Self {
            macros: Bindings::default(),
            mode,
        }
    }

    pub fn with_builtins(mode: AssertionMode) -> Self {
        let mut registry = Self::new(mode);
        registry.macros.extend(
            BuiltinMacro::iter().map(|m| (m.to_string(), Binding::Builtin(m))),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, binding: Binding) -> Result<()> {
        let name = name.into();

        if self.macros.contains_key(&name) {
            return match self.mode {
                AssertionMode::Development => Err(Error::DuplicateMacro(name)),
                AssertionMode::Production => {
                    tracing::warn!("Macro \"{}\" is already registered, ignoring", name);
                    Ok(())
                }
            };
        }

        tracing::debug!("Registering macro \"{}\"", name);
        self.macros.insert(name, binding);
        Ok(())
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, num_params: ParamNum, func: F) -> Result<()>
    where
        F: Fn(&[String]) -> Result<MacroResult> + Send + Sync + 'static,
    {
        self.register(name, Binding::Custom(MacroFn::new(num_params, func)))
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.macros
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}
