use miette::Diagnostic;
use thiserror::Error;

use crate::registry::ParamNum;

type MacroName = String;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while registering or invoking macros.
///
/// Most variants are user assertion failures: they surface to the template
/// author in development mode and are logged and degraded to an empty value
/// in production mode.
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum Error {
    #[error("Macro \"{0}\" is already registered")]
    #[diagnostic(code(amp_vars::duplicate_macro))]
    DuplicateMacro(MacroName),

    #[error("Invalid number of arguments in \"{0}\", expected {1}, got {2}")]
    #[diagnostic(code(amp_vars::invalid_number_of_arguments))]
    InvalidNumberOfArguments(MacroName, ParamNum, u8),

    #[error("{0}: {1} must be a number, got \"{2}\"")]
    #[diagnostic(code(amp_vars::invalid_number))]
    InvalidNumber(MacroName, &'static str, String),

    #[error("{0}: divided by 0")]
    #[diagnostic(code(amp_vars::zero_division))]
    ZeroDivision(MacroName),

    #[error("Invalid regular expression \"{0}\"")]
    #[diagnostic(code(amp_vars::invalid_regular_expression))]
    InvalidRegularExpression(String),

    #[error("{0} macro must contain a {1}")]
    #[diagnostic(code(amp_vars::missing_argument))]
    MissingArgument(MacroName, &'static str),

    #[error("Runtime error: {0}")]
    #[diagnostic(code(amp_vars::runtime_error))]
    Runtime(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(amp_vars::internal_error))]
    Internal(String),
}
