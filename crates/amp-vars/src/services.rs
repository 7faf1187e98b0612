//! Collaborators the engine reaches through, expressed as traits.
//!
//! Global collaborators are grouped in [`Services`] and shared by every
//! expansion of a [`crate::VariableService`]. Per-document collaborators are
//! grouped in [`DocumentServices`] and reached through the owning
//! [`crate::ElementContext`].
use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha384};

use crate::error::Result;
use crate::registry::{Allowlist, Bindings};
use crate::value::MacroOutput;

#[async_trait]
pub trait Crypto: Send + Sync {
    async fn sha384_base64(&self, input: &str) -> Result<String>;
}

pub trait LinkerReader: Send + Sync {
    fn get(&self, name: &str, id: &str) -> Option<String>;
}

pub trait Viewport: Send + Sync {
    fn scroll_top(&self) -> f64;
    fn scroll_left(&self) -> f64;
}

pub trait Experiments: Send + Sync {
    /// Active experiments and their branch ids, in a stable order.
    fn branches(&self) -> Vec<(String, String)>;

    fn branch(&self, name: &str) -> Option<String> {
        self.branches()
            .into_iter()
            .find_map(|(experiment, branch)| (experiment == name).then_some(branch))
    }
}

pub trait DocumentMeta: Send + Sync {
    fn meta(&self, name: &str) -> Option<String>;
}

pub trait Environment: Send + Sync {
    /// The IANA timezone name, when the environment exposes one.
    fn timezone_code(&self) -> Option<String>;
}

pub trait CookieReader: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Sufficient,
    Insufficient,
    NotRequired,
    Unknown,
}

impl Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentState::Sufficient => write!(f, "sufficient"),
            ConsentState::Insufficient => write!(f, "insufficient"),
            ConsentState::NotRequired => write!(f, "not_required"),
            ConsentState::Unknown => write!(f, "unknown"),
        }
    }
}

#[async_trait]
pub trait ConsentPolicy: Send + Sync {
    async fn consent_state(&self) -> Result<Option<ConsentState>>;
    async fn consent_string(&self) -> Result<Option<String>>;
    async fn consent_metadata(&self, key: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Id,
    Timestamp,
    Count,
    EventTimestamp,
    Engaged,
}

#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn get_session_value(
        &self,
        vendor_type: &str,
        key: SessionKey,
    ) -> Result<Option<MacroOutput>>;
}

/// Named page timing metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum Metric {
    #[strum(serialize = "fcp")]
    FirstContentfulPaint,
    #[strum(serialize = "fvr")]
    FirstViewportReady,
    #[strum(serialize = "mbv")]
    MakeBodyVisible,
    #[strum(serialize = "lcp")]
    LargestContentfulPaint,
    #[strum(serialize = "fid")]
    FirstInputDelay,
    #[strum(serialize = "cls")]
    CumulativeLayoutShift,
}

pub trait Performance: Send + Sync {
    fn metric(&self, metric: Metric) -> Option<f64>;
}

/// Resolves `NAME(args)`-style calls inside an already substituted string.
#[async_trait]
pub trait UrlReplacements: Send + Sync {
    async fn expand_string_async(
        &self,
        value: &str,
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> Result<String>;
}

#[derive(Clone)]
pub struct Services {
    pub crypto: Arc<dyn Crypto>,
    pub linker: Arc<dyn LinkerReader>,
    pub viewport: Arc<dyn Viewport>,
    pub experiments: Arc<dyn Experiments>,
    pub meta: Arc<dyn DocumentMeta>,
    pub environment: Arc<dyn Environment>,
}

impl Services {
    /// Builds the services from one backend for every synchronous
    /// collaborator, with SHA-384 crypto and the system environment.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: LinkerReader + Viewport + Experiments + DocumentMeta + 'static,
    {
        Self {
            crypto: Arc::new(Sha384Crypto),
            linker: backend.clone(),
            viewport: backend.clone(),
            experiments: backend.clone(),
            meta: backend,
            environment: Arc::new(SystemEnvironment),
        }
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct DocumentServices {
    pub cookies: Arc<dyn CookieReader>,
    pub consent: Arc<dyn ConsentPolicy>,
    pub session: Arc<dyn SessionManager>,
    pub performance: Arc<dyn Performance>,
}

impl DocumentServices {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CookieReader + ConsentPolicy + SessionManager + Performance + 'static,
    {
        Self {
            cookies: backend.clone(),
            consent: backend.clone(),
            session: backend.clone(),
            performance: backend,
        }
    }
}

impl fmt::Debug for DocumentServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentServices").finish_non_exhaustive()
    }
}

/// SHA-384 digests rendered as URL-safe base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha384Crypto;

#[async_trait]
impl Crypto for Sha384Crypto {
    async fn sha384_base64(&self, input: &str) -> Result<String> {
        let digest = Sha384::digest(input.as_bytes());
        Ok(crate::builtin::base64_url_encode(&digest[..]))
    }
}

/// Reads the timezone from the `TZ` environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn timezone_code(&self) -> Option<String> {
        std::env::var("TZ")
            .ok()
            .map(|tz| tz.trim_start_matches(':').to_string())
            .filter(|tz| !tz.is_empty())
    }
}
