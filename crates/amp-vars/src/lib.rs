//! `amp-vars` expands the variable templates used by AMP analytics
//! requests.
//!
//! A template such as `https://example.com/?cid=${clientId}&t=${title}` is
//! expanded against a variable bag. Each resolved value is expanded again,
//! up to a fixed depth, and then has its macro calls (`CLIENT_ID`,
//! `$SUBSTR(...)`, `COOKIE(_ga)`, ...) resolved before being percent-encoded.
//!
//! # Features
//!
//! - `${name}` and `${name(args)}` placeholders with bounded recursion
//! - Built-in string, logic, regex and arithmetic macros
//! - Per-document macros for cookies, consent, sessions and timing metrics
//! - Concurrent resolution of asynchronous macros
//! - Collaborators expressed as traits, with an in-memory backend
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use amp_vars::{Config, DocumentServices, ElementContext, ExpansionOptions, InMemory, Services, VariableService};
//!
//! #[tokio::main]
//! async fn main() -> amp_vars::Result<()> {
//!     let backend = Arc::new(InMemory::default().with_cookie("_ga", "GA1.2.345"));
//!     let service = VariableService::with_defaults(Config::default(), Services::from_backend(backend.clone()));
//!     let element = Arc::new(ElementContext::new("googleanalytics", DocumentServices::from_backend(backend)));
//!
//!     let options = ExpansionOptions::default().with_var("ga", "COOKIE");
//!     let url = service.expand_template("c=${ga(_ga)}", &options, &element, None, None).await?;
//!     assert_eq!(url, "c=GA1.2.345");
//!     Ok(())
//! }
//! ```
mod builtin;
mod config;
mod element;
mod encode;
mod error;
mod expander;
mod memory;
mod name_args;
mod options;
mod registry;
mod services;
mod value;
mod variables;

pub use builtin::BuiltinMacro;
pub use config::{AssertionMode, Config, LogFormat};
pub use element::{ElementContext, ElementMacro};
pub use encode::{encode_uri_component, encode_vars};
pub use error::{Error, Result};
pub use expander::MacroExpander;
pub use memory::InMemory;
pub use name_args::{NameArgs, get_name_args};
pub use options::{DEFAULT_ITERATIONS, ExpansionOptions, Vars};
pub use registry::{Allowlist, Binding, Bindings, MacroFn, MacroRegistry, ParamNum};
pub use services::{
    ConsentPolicy, ConsentState, CookieReader, Crypto, DocumentMeta, DocumentServices, Environment,
    Experiments, LinkerReader, Metric, Performance, Services, SessionKey, SessionManager,
    Sha384Crypto, SystemEnvironment, UrlReplacements, Viewport,
};
pub use value::{MacroOutput, MacroResult, VarValue, format_number, string_to_bool};
pub use variables::VariableService;
