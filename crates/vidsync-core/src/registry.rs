//! Create-or-find stub assets in the remote registry and patch them with
//! final metadata once processing has finished.
//!
//! A stub is identified by a title containing the placeholder sentinel plus
//! an exact checksum match, so a worker that crashed between creating the
//! stub and finalizing it picks the same asset up again on the next run.

use crate::config::RegistryConfig;
use crate::error::Error;
use crate::metadata::MetadataRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Opaque registry identifier. Numeric ids are kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetId(pub String);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AssetId {
    fn from_json(value: &Value) -> Result<Self, Error> {
        match value.get("id") {
            Some(Value::Number(n)) => Ok(AssetId(n.to_string())),
            Some(Value::String(s)) if !s.is_empty() => Ok(AssetId(s.clone())),
            _ => Err(Error::RegistryDecode(format!("no id in {}", value))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StubSearch {
    count: u64,
    #[serde(default)]
    results: Vec<Value>,
}

/// Body for a new stub: the title carries the placeholder until finalized.
#[derive(Debug, Serialize)]
pub struct StubDraft<'a> {
    pub title: String,
    pub master_metadata: &'a MetadataRecord,
}

impl<'a> StubDraft<'a> {
    pub fn new(file_name: &str, placeholder: &str, master_metadata: &'a MetadataRecord) -> Self {
        Self {
            title: format!("{} {}", file_name, placeholder),
            master_metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FinalAsset<'a> {
    pub title: String,
    pub master_metadata: &'a MetadataRecord,
}

impl<'a> FinalAsset<'a> {
    pub fn new(file_name: &str, master_metadata: &'a MetadataRecord) -> Self {
        Self {
            title: file_name.to_string(),
            master_metadata,
        }
    }
}

pub struct RegistryClient {
    agent: ureq::Agent,
    endpoint: String,
    authorization: String,
    placeholder: String,
}

impl RegistryClient {
    /// Fails with `InvalidConfig` when no endpoint is configured.
    pub fn new(config: &RegistryConfig) -> Result<Self, Error> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "registry.endpoint must be set".to_string(),
            ));
        }
        let mut endpoint = config.endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        Ok(Self {
            agent,
            endpoint,
            authorization: format!("{} {}", config.auth_scheme, config.token.trim()),
            placeholder: config.placeholder.clone(),
        })
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn assets_url(&self) -> String {
        format!("{}assets/", self.endpoint)
    }

    /// Return the id of the stub for `checksum`, creating it from `draft` if none exists.
    ///
    /// More than one matching stub is an error: picking one could attach the
    /// final metadata to the wrong record, and creating another would add a duplicate.
    pub fn ensure_stub<T: Serialize>(&self, checksum: &str, draft: &T) -> Result<AssetId, Error> {
        let url = self.assets_url();
        let request = self
            .agent
            .get(&url)
            .query("title_contains", &self.placeholder)
            .query("checksum", checksum);
        let search: StubSearch = decode(self.call(request, None)?)?;

        match search.count {
            0 => {
                let body = serde_json::to_value(draft)?;
                let created: Value = decode(self.call(self.agent.post(&url), Some(body))?)?;
                let id = AssetId::from_json(&created)?;
                info!("Created stub asset {} for checksum {}", id, checksum);
                Ok(id)
            }
            1 => {
                let existing = search.results.first().ok_or_else(|| {
                    Error::RegistryDecode("count is 1 but results are empty".to_string())
                })?;
                let id = AssetId::from_json(existing)?;
                info!("Reusing stub asset {} for checksum {}", id, checksum);
                Ok(id)
            }
            count => Err(Error::AmbiguousStubMatch {
                checksum: checksum.to_string(),
                count,
            }),
        }
    }

    /// Patch the asset with its final fields.
    pub fn finalize<T: Serialize>(&self, asset_id: &AssetId, final_fields: &T) -> Result<(), Error> {
        let url = format!("{}{}/", self.assets_url(), asset_id);
        let body = serde_json::to_value(final_fields)?;
        self.call(self.agent.request("PATCH", &url), Some(body))?;
        info!("Finalized asset {}", asset_id);
        Ok(())
    }

    fn call(&self, request: ureq::Request, body: Option<Value>) -> Result<ureq::Response, Error> {
        debug!("{} {}", request.method(), request.url());
        let request = request
            .set("Accept", "application/json")
            .set("Authorization", &self.authorization);

        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(Error::Registry { status, body })
            }
            Err(ureq::Error::Transport(err)) => Err(Error::RegistryTransport(err.to_string())),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, Error> {
    response
        .into_json::<T>()
        .map_err(|err| Error::RegistryDecode(err.to_string()))
}
