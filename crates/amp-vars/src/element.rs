use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::error::{Error, Result};
use crate::registry::ParamNum;
use crate::services::{DocumentServices, Metric, SessionKey};
use crate::value::{MacroOutput, MacroResult};

/// The element an expansion runs for. It is only used to reach the
/// document's collaborators.
#[derive(Debug, Clone)]
pub struct ElementContext {
    pub vendor_type: String,
    pub in_embedded_doc: bool,
    pub services: DocumentServices,
}

impl ElementContext {
    pub fn new(vendor_type: impl Into<String>, services: DocumentServices) -> Self {
        Self {
            vendor_type: vendor_type.into(),
            in_embedded_doc: false,
            services,
        }
    }

    /// Marks the element as living inside a nested embedded document, whose
    /// timing metrics are not exposed.
    pub fn embedded(mut self, in_embedded_doc: bool) -> Self {
        self.in_embedded_doc = in_embedded_doc;
        self
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum ElementMacro {
    #[strum(serialize = "COOKIE")]
    Cookie,
    #[strum(serialize = "CONSENT_STATE")]
    ConsentState,
    #[strum(serialize = "CONSENT_STRING")]
    ConsentString,
    #[strum(serialize = "CONSENT_METADATA")]
    ConsentMetadata,
    #[strum(serialize = "SESSION_ID")]
    SessionId,
    #[strum(serialize = "SESSION_TIMESTAMP")]
    SessionTimestamp,
    #[strum(serialize = "SESSION_COUNT")]
    SessionCount,
    #[strum(serialize = "SESSION_EVENT_TIMESTAMP")]
    SessionEventTimestamp,
    #[strum(serialize = "SESSION_ENGAGED")]
    SessionEngaged,
    #[strum(serialize = "FIRST_CONTENTFUL_PAINT")]
    FirstContentfulPaint,
    #[strum(serialize = "FIRST_VIEWPORT_READY")]
    FirstViewportReady,
    #[strum(serialize = "MAKE_BODY_VISIBLE")]
    MakeBodyVisible,
    #[strum(serialize = "LARGEST_CONTENTFUL_PAINT")]
    LargestContentfulPaint,
    #[strum(serialize = "FIRST_INPUT_DELAY")]
    FirstInputDelay,
    #[strum(serialize = "CUMULATIVE_LAYOUT_SHIFT")]
    CumulativeLayoutShift,
}

impl ElementMacro {
    pub fn metric(&self) -> Option<Metric> {
        match self {
            ElementMacro::FirstContentfulPaint => Some(Metric::FirstContentfulPaint),
            ElementMacro::FirstViewportReady => Some(Metric::FirstViewportReady),
            ElementMacro::MakeBodyVisible => Some(Metric::MakeBodyVisible),
            ElementMacro::LargestContentfulPaint => Some(Metric::LargestContentfulPaint),
            ElementMacro::FirstInputDelay => Some(Metric::FirstInputDelay),
            ElementMacro::CumulativeLayoutShift => Some(Metric::CumulativeLayoutShift),
            _ => None,
        }
    }

    pub fn is_performance(&self) -> bool {
        self.metric().is_some()
    }

    fn session_key(&self) -> Option<SessionKey> {
        match self {
            ElementMacro::SessionId => Some(SessionKey::Id),
            ElementMacro::SessionTimestamp => Some(SessionKey::Timestamp),
            ElementMacro::SessionCount => Some(SessionKey::Count),
            ElementMacro::SessionEventTimestamp => Some(SessionKey::EventTimestamp),
            ElementMacro::SessionEngaged => Some(SessionKey::Engaged),
            _ => None,
        }
    }

    /// Macros that do not read timing metrics.
    pub fn document_macros() -> impl Iterator<Item = ElementMacro> {
        ElementMacro::iter().filter(|m| !m.is_performance())
    }

    pub fn performance_macros() -> impl Iterator<Item = ElementMacro> {
        ElementMacro::iter().filter(ElementMacro::is_performance)
    }

    pub fn num_params(&self) -> ParamNum {
        match self {
            ElementMacro::Cookie | ElementMacro::ConsentMetadata => ParamNum::Range(0, 1),
            _ => ParamNum::None,
        }
    }

    pub fn invoke(&self, element: &ElementContext, args: &[String]) -> Result<MacroResult> {
        if let Some(metric) = self.metric() {
            return Ok(element
                .services
                .performance
                .metric(metric)
                .map(MacroOutput::Number)
                .unwrap_or(MacroOutput::EMPTY)
                .into());
        }

        if let Some(key) = self.session_key() {
            let session = Arc::clone(&element.services.session);
            let vendor_type = element.vendor_type.clone();
            return Ok(MacroResult::Async(Box::pin(async move {
                Ok::<_, Error>(session
                    .get_session_value(&vendor_type, key)
                    .await?
                    .unwrap_or(MacroOutput::EMPTY))
            })));
        }

        match self {
            ElementMacro::Cookie => {
                let name = args.first().map(String::as_str).unwrap_or_default();
                Ok(MacroOutput::from(element.services.cookies.cookie(name)).into())
            }
            ElementMacro::ConsentState => {
                let consent = Arc::clone(&element.services.consent);
                Ok(MacroResult::Async(Box::pin(async move {
                    Ok::<_, Error>(consent
                        .consent_state()
                        .await?
                        .map(|state| state.to_string())
                        .into())
                })))
            }
            ElementMacro::ConsentString => {
                let consent = Arc::clone(&element.services.consent);
                Ok(MacroResult::Async(Box::pin(async move {
                    Ok::<_, Error>(consent.consent_string().await?.into())
                })))
            }
            ElementMacro::ConsentMetadata => {
                let key = args
                    .first()
                    .filter(|key| !key.is_empty())
                    .cloned()
                    .ok_or_else(|| Error::MissingArgument(self.to_string(), "key"))?;
                let consent = Arc::clone(&element.services.consent);
                Ok(MacroResult::Async(Box::pin(async move {
                    Ok::<_, Error>(consent.consent_metadata(&key).await?.into())
                })))
            }
            _ => Err(Error::Internal(format!("{} is not a document macro", self))),
        }
    }
}
