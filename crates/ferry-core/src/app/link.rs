//! Public download links.

use crate::domain::{ConfigError, PublicId};

/// Builds `<base>/download/<public id>` links for the front-end to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(base: impl Into<String>) -> Result<Self, ConfigError> {
        let base = base.into();
        let trimmed = base.trim().trim_end_matches('/');
        let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        let has_host = trimmed
            .split_once("://")
            .is_some_and(|(_, host)| !host.is_empty());
        if !has_scheme || !has_host {
            return Err(ConfigError::InvalidBaseUrl(base));
        }
        Ok(Self {
            base: trimmed.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn download_url(&self, public_id: &PublicId) -> String {
        format!("{}/download/{}", self.base, public_id)
    }
}
