//! Provider configuration resolution.
//!
//! Combines the backend's [`ProviderCapabilities`] (which credentials are
//! already configured in the backend environment) with the fields a user
//! entered, and produces a validated [`SummarizationRequest`] or the full
//! list of missing field labels.
//!
//! Each field is merged once by [`merge_field`]: a non-empty user value
//! wins, otherwise the field counts as available when the backend reports
//! it, otherwise it is missing. Each provider variant of [`ProviderConfig`]
//! then validates its own typed fields:
//!
//! | Provider | Required unless reported by the backend |
//! |----------|------------------------------------------|
//! | `openai`, `groq` | API key |
//! | `watsonx` | API key, URL, and one of project ID / space ID |
//! | `ollama` | nothing |
//!
//! A model is always required. Selecting the [`CUSTOM_MODEL`] sentinel uses
//! the free-text custom model instead of the preset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use anyhow::Result;

use crate::backend::{HttpBackend, SummarizeBackend};
use crate::config::Config;
use crate::models::{Provider, SummarizationRequest};

/// Model selector value meaning "use the custom free-text model".
pub const CUSTOM_MODEL: &str = "other";

pub const LABEL_MODEL: &str = "Model";
pub const LABEL_API_KEY: &str = "API Key";
pub const LABEL_WATSONX_URL: &str = "Watsonx URL";
pub const LABEL_PROJECT_OR_SPACE: &str = "Project ID or Space ID";

// ============ Capabilities ============

/// Which fields the backend already has configured for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    #[serde(default)]
    pub has_apikey: bool,
    #[serde(default)]
    pub has_url: bool,
    #[serde(default)]
    pub has_project_id: bool,
    #[serde(default)]
    pub has_space_id: bool,
}

/// Capability flags per provider, as reported by `GET /providers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    providers: HashMap<Provider, CapabilityFlags>,
}

impl ProviderCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the backend's JSON map. Unknown providers, unknown flags,
    /// and malformed entries are ignored.
    pub fn from_json(value: &Value) -> Self {
        let mut providers = HashMap::new();
        if let Some(map) = value.as_object() {
            for (name, flags) in map {
                let Some(provider) = Provider::parse(name) else {
                    continue;
                };
                match serde_json::from_value::<CapabilityFlags>(flags.clone()) {
                    Ok(flags) => {
                        providers.insert(provider, flags);
                    }
                    Err(e) => {
                        tracing::warn!(provider = name.as_str(), error = %e, "ignoring malformed capability entry");
                    }
                }
            }
        }
        Self { providers }
    }

    pub fn with(mut self, provider: Provider, flags: CapabilityFlags) -> Self {
        self.providers.insert(provider, flags);
        self
    }

    /// Flags for `provider`; all false when the backend reported nothing.
    pub fn flags(&self, provider: Provider) -> CapabilityFlags {
        self.providers.get(&provider).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Process-wide capability cache, owned by the orchestrator setup phase.
///
/// Starts `Unconfigured`, which behaves exactly like an empty map.
#[derive(Debug, Clone, Default)]
pub enum CapabilityCache {
    #[default]
    Unconfigured,
    Loaded(ProviderCapabilities),
}

impl CapabilityCache {
    /// Fetch capabilities from the backend. Never fails: an unreachable
    /// backend or a bad response leaves an empty map.
    pub async fn refresh(&mut self, backend: &dyn SummarizeBackend) {
        let caps = match backend.fetch_providers().await {
            Ok(caps) => caps,
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch provider config, assuming nothing is configured");
                ProviderCapabilities::new()
            }
        };
        *self = CapabilityCache::Loaded(caps);
    }

    pub fn invalidate(&mut self) {
        *self = CapabilityCache::Unconfigured;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, CapabilityCache::Loaded(_))
    }

    pub fn capabilities(&self) -> ProviderCapabilities {
        match self {
            CapabilityCache::Unconfigured => ProviderCapabilities::new(),
            CapabilityCache::Loaded(caps) => caps.clone(),
        }
    }
}

// ============ User input ============

/// Fields the user entered for one summarization.
#[derive(Debug, Clone)]
pub struct ProviderForm {
    pub provider: Provider,
    /// Preset model name, or [`CUSTOM_MODEL`].
    pub model: String,
    pub custom_model: String,
    pub apikey: String,
    pub project_id: String,
    pub space_id: String,
    pub watsonx_url: String,
    pub instructions: String,
}

impl ProviderForm {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            custom_model: String::new(),
            apikey: String::new(),
            project_id: String::new(),
            space_id: String::new(),
            watsonx_url: String::new(),
            instructions: String::new(),
        }
    }

    pub fn uses_custom_model(&self) -> bool {
        self.model.trim() == CUSTOM_MODEL
    }

    /// The model after resolving the custom sentinel; may be empty.
    pub fn resolved_model(&self) -> &str {
        if self.uses_custom_model() {
            self.custom_model.trim()
        } else {
            self.model.trim()
        }
    }
}

// ============ Merge + validation ============

/// Where a resolved field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Entered by the user; sent in the request.
    User(String),
    /// Already configured in the backend environment; sent empty.
    Environment,
    Missing,
}

impl FieldSource {
    pub fn is_available(&self) -> bool {
        !matches!(self, FieldSource::Missing)
    }

    pub fn is_from_environment(&self) -> bool {
        matches!(self, FieldSource::Environment)
    }

    /// Value to put in the request payload.
    pub fn payload_value(&self) -> String {
        match self {
            FieldSource::User(v) => v.clone(),
            FieldSource::Environment | FieldSource::Missing => String::new(),
        }
    }
}

/// Merge one user-entered field with the backend's flag for it.
pub fn merge_field(user_value: &str, env_supplied: bool) -> FieldSource {
    let value = user_value.trim();
    if !value.is_empty() {
        FieldSource::User(value.to_string())
    } else if env_supplied {
        FieldSource::Environment
    } else {
        FieldSource::Missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedConfig {
    pub apikey: FieldSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatsonxConfig {
    pub apikey: FieldSource,
    pub url: FieldSource,
    pub project_id: FieldSource,
    pub space_id: FieldSource,
}

/// Typed, merged configuration for the selected provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    OpenAi(KeyedConfig),
    Groq(KeyedConfig),
    Watsonx(WatsonxConfig),
    Ollama,
}

impl ProviderConfig {
    pub fn merge(flags: CapabilityFlags, form: &ProviderForm) -> Self {
        let apikey = || merge_field(&form.apikey, flags.has_apikey);
        match form.provider {
            Provider::OpenAi => ProviderConfig::OpenAi(KeyedConfig { apikey: apikey() }),
            Provider::Groq => ProviderConfig::Groq(KeyedConfig { apikey: apikey() }),
            Provider::Watsonx => ProviderConfig::Watsonx(WatsonxConfig {
                apikey: apikey(),
                url: merge_field(&form.watsonx_url, flags.has_url),
                project_id: merge_field(&form.project_id, flags.has_project_id),
                space_id: merge_field(&form.space_id, flags.has_space_id),
            }),
            Provider::Ollama => ProviderConfig::Ollama,
        }
    }

    /// Labels of every required field that is neither entered nor configured.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            ProviderConfig::OpenAi(c) | ProviderConfig::Groq(c) => validate_keyed(c),
            ProviderConfig::Watsonx(c) => validate_watsonx(c),
            ProviderConfig::Ollama => Vec::new(),
        }
    }

    fn apply(&self, request: &mut SummarizationRequest) {
        match self {
            ProviderConfig::OpenAi(c) | ProviderConfig::Groq(c) => {
                request.apikey = c.apikey.payload_value();
            }
            ProviderConfig::Watsonx(c) => {
                request.apikey = c.apikey.payload_value();
                request.project_id = Some(c.project_id.payload_value());
                request.space_id = Some(c.space_id.payload_value());
                request.watsonx_url = Some(c.url.payload_value());
            }
            ProviderConfig::Ollama => {}
        }
    }
}

fn validate_keyed(c: &KeyedConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !c.apikey.is_available() {
        missing.push(LABEL_API_KEY);
    }
    missing
}

fn validate_watsonx(c: &WatsonxConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !c.apikey.is_available() {
        missing.push(LABEL_API_KEY);
    }
    if !c.url.is_available() {
        missing.push(LABEL_WATSONX_URL);
    }
    // Either identifier is enough; both is fine too.
    if !c.project_id.is_available() && !c.space_id.is_available() {
        missing.push(LABEL_PROJECT_OR_SPACE);
    }
    missing
}

/// Output of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub request: SummarizationRequest,
    pub config: ProviderConfig,
    /// Set when the model came from the custom free-text field.
    pub custom_model: Option<String>,
}

/// Validate `form` against `caps` and build the request carrying `text`.
///
/// On failure returns every missing field label, in form order.
pub fn resolve(
    caps: &ProviderCapabilities,
    form: &ProviderForm,
    text: String,
) -> Result<ResolvedRequest, Vec<String>> {
    let model = form.resolved_model().to_string();
    let config = ProviderConfig::merge(caps.flags(form.provider), form);

    let mut missing: Vec<String> = Vec::new();
    if model.is_empty() {
        missing.push(LABEL_MODEL.to_string());
    }
    missing.extend(config.missing_fields().into_iter().map(String::from));
    if !missing.is_empty() {
        return Err(missing);
    }

    let custom_model = form.uses_custom_model().then(|| model.clone());
    let mut request = SummarizationRequest {
        provider: form.provider,
        model,
        apikey: String::new(),
        instructions: form.instructions.trim().to_string(),
        text,
        project_id: None,
        space_id: None,
        watsonx_url: None,
    };
    config.apply(&mut request);

    Ok(ResolvedRequest {
        request,
        config,
        custom_model,
    })
}

// ============ CLI entry point ============

/// `summer providers`: show which credentials the backend already has.
pub async fn run_providers(config: &Config) -> Result<()> {
    let backend = HttpBackend::from_config(config)?;
    let mut cache = CapabilityCache::default();
    cache.refresh(&backend).await;
    let caps = cache.capabilities();

    if caps.is_empty() {
        println!(
            "No provider configuration reported by {} (is the backend running?)",
            backend.base_url()
        );
        println!();
    }

    println!(
        "{:<10} {:>7} {:>5} {:>11} {:>9}  {}",
        "PROVIDER", "APIKEY", "URL", "PROJECT_ID", "SPACE_ID", "DEFAULT MODEL"
    );
    for provider in Provider::ALL {
        let flags = caps.flags(provider);
        println!(
            "{:<10} {:>7} {:>5} {:>11} {:>9}  {}",
            provider.as_str(),
            yes_no(flags.has_apikey),
            yes_no(flags.has_url),
            yes_no(flags.has_project_id),
            yes_no(flags.has_space_id),
            config.default_model(provider).unwrap_or("-"),
        );
    }
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
