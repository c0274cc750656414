//! HTTP client for tablerest resources

use std::time::Duration;

use url::Url;

use tablerest_common::config::ClientConfig;

use crate::builder::QueryBuilder;
use crate::error::{ClientError, Result};

/// tablerest client
///
/// Cheap to clone; every clone shares one connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    /// Base URL including the resource prefix
    base: Url,
    /// HTTP client
    http: reqwest::Client,
}

impl Client {
    /// Build a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)?;
        base.path_segments_mut()
            .map_err(|()| ClientError::CannotBeABase(config.base_url.clone()))?
            .pop_if_empty()
            .extend(config.prefix.split('/').filter(|s| !s.is_empty()));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { base, http })
    }

    /// Connect to `base_url` with the default prefix and timeout
    pub fn connect(base_url: &str) -> Result<Self> {
        Self::new(&ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        })
    }

    /// Start a fresh query against `resource`
    pub fn from(&self, resource: &str) -> QueryBuilder {
        QueryBuilder::new(self.clone(), resource)
    }

    /// `{base_url}{prefix}/{resource}[/{id}]`, segments percent-encoded
    pub fn resource_url(&self, resource: &str, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(resource);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url() {
        let client = Client::new(&ClientConfig {
            base_url: "http://localhost:3000/".to_string(),
            prefix: "/api/v1/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(
            client.resource_url("users", None).as_str(),
            "http://localhost:3000/api/v1/users"
        );
        assert_eq!(
            client.resource_url("users", Some("a b/c")).as_str(),
            "http://localhost:3000/api/v1/users/a%20b%2Fc"
        );
    }

    #[test]
    fn test_empty_prefix() {
        let client = Client::new(&ClientConfig {
            prefix: String::new(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.resource_url("posts", Some("7")).as_str(),
            "http://localhost:3000/posts/7"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            Client::connect("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            Client::connect("mailto:ops@example.com"),
            Err(ClientError::CannotBeABase(_))
        ));
    }
}
