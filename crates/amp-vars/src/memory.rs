use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::services::{
    ConsentPolicy, ConsentState, CookieReader, DocumentMeta, Experiments, LinkerReader, Metric,
    Performance, SessionKey, SessionManager, Viewport,
};
use crate::value::MacroOutput;

/// A collaborator backend holding fixed values, configured with builder
/// methods. Used by the command-line tool and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemory {
    linker_params: FxHashMap<(String, String), String>,
    scroll_top: f64,
    scroll_left: f64,
    experiments: Vec<(String, String)>,
    meta: FxHashMap<String, String>,
    cookies: FxHashMap<String, String>,
    consent_state: Option<ConsentState>,
    consent_string: Option<String>,
    consent_metadata: FxHashMap<String, String>,
    sessions: FxHashMap<(String, SessionKey), MacroOutput>,
    metrics: FxHashMap<Metric, f64>,
}

impl InMemory {
    pub fn with_linker_param(mut self, name: &str, id: &str, value: &str) -> Self {
        self.linker_params
            .insert((name.to_string(), id.to_string()), value.to_string());
        self
    }

    pub fn with_scroll(mut self, top: f64, left: f64) -> Self {
        self.scroll_top = top;
        self.scroll_left = left;
        self
    }

    pub fn with_experiment(mut self, name: &str, branch: &str) -> Self {
        self.experiments.push((name.to_string(), branch.to_string()));
        self
    }

    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.insert(name.to_string(), content.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_consent_state(mut self, state: ConsentState) -> Self {
        self.consent_state = Some(state);
        self
    }

    pub fn with_consent_string(mut self, value: &str) -> Self {
        self.consent_string = Some(value.to_string());
        self
    }

    pub fn with_consent_metadata(mut self, key: &str, value: &str) -> Self {
        self.consent_metadata
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_session_value(
        mut self,
        vendor_type: &str,
        key: SessionKey,
        value: impl Into<MacroOutput>,
    ) -> Self {
        self.sessions
            .insert((vendor_type.to_string(), key), value.into());
        self
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        self.metrics.insert(metric, value);
        self
    }
}

impl LinkerReader for InMemory {
    fn get(&self, name: &str, id: &str) -> Option<String> {
        self.linker_params
            .get(&(name.to_string(), id.to_string()))
            .cloned()
    }
}

impl Viewport for InMemory {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_left(&self) -> f64 {
        self.scroll_left
    }
}

impl Experiments for InMemory {
    fn branches(&self) -> Vec<(String, String)> {
        self.experiments.clone()
    }
}

impl DocumentMeta for InMemory {
    fn meta(&self, name: &str) -> Option<String> {
        self.meta.get(name).cloned()
    }
}

impl CookieReader for InMemory {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }
}

#[async_trait]
impl ConsentPolicy for InMemory {
    async fn consent_state(&self) -> Result<Option<ConsentState>> {
        Ok(self.consent_state)
    }

    async fn consent_string(&self) -> Result<Option<String>> {
        Ok(self.consent_string.clone())
    }

    async fn consent_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self.consent_metadata.get(key).cloned())
    }
}

#[async_trait]
impl SessionManager for InMemory {
    async fn get_session_value(
        &self,
        vendor_type: &str,
        key: SessionKey,
    ) -> Result<Option<MacroOutput>> {
        Ok(self.sessions.get(&(vendor_type.to_string(), key)).cloned())
    }
}

impl Performance for InMemory {
    fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }
}
