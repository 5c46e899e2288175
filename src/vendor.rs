//! Client for the paid proxy vendor.

use crate::error::{SettingsError, VendorError};
use crate::proxy::with_credentials;
use crate::settings::{keys, SettingsStore};
use crate::utils;

use async_trait::async_trait;
use log::info;
use std::time::Duration;
use url::Url;

/// Default vendor endpoint returning `host:port` lines.
pub const DEFAULT_VENDOR_API: &str = "https://dps.kdlapi.com/api/getdps/";

/// A source of raw, untested proxy candidates.
#[async_trait]
pub trait VendorSource: Send + Sync {
    /// Fetch up to `batch_size` candidates, already wrapped with credentials.
    async fn fetch_batch(&self, batch_size: usize) -> Result<Vec<String>, VendorError>;
}

/// Account used to call the vendor API and authenticate against its proxies.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorCredentials {
    pub secret_id: String,
    pub signature: String,
    pub username: String,
    pub password: String,
}

impl VendorCredentials {
    /// Read the four credential keys, reporting the first missing one.
    pub fn from_settings(settings: &dyn SettingsStore) -> Result<Self, SettingsError> {
        Ok(Self {
            signature: required(settings, keys::VENDOR_SIGNATURE)?,
            secret_id: required(settings, keys::VENDOR_SECRET_ID)?,
            username: required(settings, keys::VENDOR_USERNAME)?,
            password: required(settings, keys::VENDOR_PASSWORD)?,
        })
    }
}

fn required(settings: &dyn SettingsStore, key: &'static str) -> Result<String, SettingsError> {
    match settings.get_string(key)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SettingsError::Missing(key)),
    }
}

/// HTTP vendor client.
pub struct HttpVendor {
    api: String,
    credentials: VendorCredentials,
    client: reqwest::Client,
}

impl HttpVendor {
    /// Client for the default vendor endpoint.
    pub fn new(credentials: VendorCredentials) -> Result<Self, VendorError> {
        Self::with_api(DEFAULT_VENDOR_API, credentials)
    }

    /// Client for a custom vendor endpoint.
    pub fn with_api(api: impl Into<String>, credentials: VendorCredentials) -> Result<Self, VendorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            api: api.into(),
            credentials,
            client,
        })
    }

    fn batch_url(&self, batch_size: usize) -> Result<Url, VendorError> {
        let url = Url::parse_with_params(
            &self.api,
            &[
                ("secret_id", self.credentials.secret_id.as_str()),
                ("signature", self.credentials.signature.as_str()),
                ("num", &batch_size.to_string()),
                ("format", "text"),
                ("sep", "1"),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl VendorSource for HttpVendor {
    async fn fetch_batch(&self, batch_size: usize) -> Result<Vec<String>, VendorError> {
        let url = self.batch_url(batch_size)?;
        info!("Requesting {} proxies from {}", batch_size, self.api);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VendorError::Status(response.status()));
        }
        let content = response.text().await?;

        Ok(utils::parse_vendor_list(&content)
            .iter()
            .map(|raw| with_credentials(raw, &self.credentials.username, &self.credentials.password))
            .collect())
    }
}
