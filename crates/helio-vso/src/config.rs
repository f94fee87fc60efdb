//! Client configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `HELIO_`-prefixed environment variables (`HELIO_URL`, `HELIO_MAX_ROUNDS`,
//! ...).

use std::path::Path;

use figment::{
    Figment,
    providers::{self, Format, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "https://docs.virtualsolar.org/api";

/// Delivery methods tried, in order, when the archive offers a choice.
pub const METHOD_ORDER: [&str; 5] = ["URL-TAR_GZ", "URL-ZIP", "URL-TAR", "URL-FILE", "URL-packaged"];

/// What to do with a disjunct the converter cannot translate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    /// Record the error on the response and continue with other disjuncts.
    #[default]
    Skip,
    /// Fail the whole query.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url:            String,
    pub method_order:   Vec<String>,
    /// Negotiation rounds allowed per provider group before giving up.
    pub max_rounds:     usize,
    pub max_concurrent: usize,
    pub translation:    Translation,
    pub proxies:        Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url:            DEFAULT_URL.to_string(),
            method_order:   METHOD_ORDER.iter().map(ToString::to_string).collect(),
            max_rounds:     8,
            max_concurrent: 4,
            translation:    Translation::Skip,
            proxies:        Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut fig = Figment::from(Serialized::defaults(ClientConfig::default()));
        if let Some(path) = path {
            fig = fig.merge(providers::Toml::file(path));
        }
        fig.merge(providers::Env::prefixed("HELIO_"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> { Self::figment(path).extract().map_err(Error::Config) }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_translation(mut self, translation: Translation) -> Self {
        self.translation = translation;
        self
    }
}
