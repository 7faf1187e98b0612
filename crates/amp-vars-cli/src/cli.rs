use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use amp_vars::{
    Allowlist, AssertionMode, Config, DocumentServices, ElementContext, InMemory, Services,
    VarValue, VariableService, Vars,
};
use clap::Parser;
use miette::{IntoDiagnostic, miette};

const VENDOR_TYPE: &str = "amp-vars";

#[derive(Parser, Debug)]
#[command(name = "amp-vars")]
#[command(version = "0.1.0")]
#[command(after_help = "Examples:\n\n\
    To expand a variable:\n\
    $ amp-vars --var title='Hello AMP' 'https://example.com/?t=${title}'\n\n\
    To call a macro with arguments:\n\
    $ amp-vars --cookie _ga=GA1.2.345 --var ga=COOKIE 'c=${ga(_ga)}'\n\n\
    To read the template from a file:\n\
    $ amp-vars -f request.txt --array ids=1,2,3")]
#[command(
    about = "amp-vars expands AMP analytics variable templates against in-memory values.",
    long_about = None
)]
pub struct Cli {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    document: DocumentArgs,

    #[clap(flatten)]
    expansion: ExpansionArgs,

    /// Template to expand. Read from stdin when omitted
    template: Option<String>,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct InputArgs {
    /// Load the template from the file
    #[arg(short, long, conflicts_with = "template")]
    from_file: Option<PathBuf>,

    /// Sets a variable
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,

    /// Sets a variable holding a comma-separated list
    #[arg(long = "array", value_name = "NAME=A,B,C", value_parser = parse_key_value)]
    arrays: Vec<(String, String)>,

    /// Emits the variable's placeholder literally
    #[arg(long = "freeze", value_name = "NAME")]
    frozen: Vec<String>,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct DocumentArgs {
    /// Sets a meta tag read by AMPDOC_META
    #[arg(long = "meta", value_name = "NAME=CONTENT", value_parser = parse_key_value)]
    meta: Vec<(String, String)>,

    /// Sets a cookie read by COOKIE
    #[arg(long = "cookie", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    cookies: Vec<(String, String)>,

    /// Expands as an element inside an embedded document
    #[arg(long, default_value_t = false)]
    embedded: bool,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct ExpansionArgs {
    /// Maximum nesting depth of variable expansion
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    iterations: Option<i32>,

    /// Do not percent-encode expanded values
    #[arg(long, default_value_t = false)]
    no_encode: bool,

    /// Only allow the named macro to be called. Can be repeated
    #[arg(long = "allow", value_name = "MACRO")]
    allowlist: Vec<String>,

    /// Log macro failures and continue with empty values
    #[arg(long, default_value_t = false)]
    production: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))
}

impl Cli {
    /// Overrides the environment configuration with command-line flags.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(iterations) = self.expansion.iterations {
            config.iterations = iterations;
        }

        if self.expansion.production {
            config.mode = AssertionMode::Production;
        }

        config
    }

    pub async fn run(&self, config: Config) -> miette::Result<()> {
        let template = self.read_template()?;

        let backend = Arc::new(self.backend());
        let service = VariableService::with_defaults(config.clone(), Services::from_backend(Arc::clone(&backend)));
        let element = Arc::new(
            ElementContext::new(VENDOR_TYPE, DocumentServices::from_backend(backend)).embedded(self.document.embedded),
        );

        let mut options = config.expansion_options(self.vars());
        options.no_encode = self.expansion.no_encode;
        for name in &self.input.frozen {
            options.freeze_var(name.as_str());
        }

        let allowlist = (!self.expansion.allowlist.is_empty())
            .then(|| self.expansion.allowlist.iter().cloned().collect::<Allowlist>());

        let expanded = service
            .expand_template(&template, &options, &element, None, allowlist.as_ref())
            .await?;

        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());
        writeln!(handle, "{}", expanded).into_diagnostic()?;
        handle.flush().into_diagnostic()
    }

    fn read_template(&self) -> miette::Result<String> {
        let template = match (&self.template, &self.input.from_file) {
            (Some(template), _) => return Ok(template.clone()),
            (None, Some(path)) => {
                if !path.exists() {
                    return Err(miette!("File not found: {}", path.display()));
                }
                fs::read_to_string(path).into_diagnostic()?
            }
            (None, None) => io::read_to_string(io::stdin()).into_diagnostic()?,
        };

        Ok(template.trim_end_matches(['\n', '\r']).to_string())
    }

    fn vars(&self) -> Vars {
        let scalars = self
            .input
            .vars
            .iter()
            .map(|(name, value)| (name.clone(), VarValue::from(value.as_str())));
        let arrays = self.input.arrays.iter().map(|(name, items)| {
            let items = items.split(',').map(str::to_string).collect::<Vec<_>>();
            (name.clone(), VarValue::from(items))
        });

        scalars.chain(arrays).collect()
    }

    fn backend(&self) -> InMemory {
        let backend = self
            .document
            .meta
            .iter()
            .fold(InMemory::default(), |backend, (name, content)| backend.with_meta(name, content));

        self.document
            .cookies
            .iter()
            .fold(backend, |backend, (name, value)| backend.with_cookie(name, value))
    }
}
