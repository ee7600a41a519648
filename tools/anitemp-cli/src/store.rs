//! Template content store client (Sanity HTTP query API).

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use anitemp_common::config::ContentStoreConfig;
use anitemp_edit_model::{TemplateCatalog, TemplateRecord};

/// Projection of every template document with asset URLs dereferenced.
pub const TEMPLATE_QUERY: &str = r#"*[_type == "template"]{
  _id,
  title,
  category,
  duration,
  downloads,
  new,
  preview{ asset->{ _ref, url } },
  texts[],
  transitions[],
  tags,
  videos[]{ videoFile{ asset->{ _ref, url } } }
}"#;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Vec<TemplateRecord>,
}

pub struct ContentStore {
    client: reqwest::Client,
    config: ContentStoreConfig,
}

impl ContentStore {
    pub fn new(config: &ContentStoreConfig, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Query endpoint for the configured project and dataset.
    pub fn endpoint(&self) -> String {
        let host = if self.config.use_cdn { "apicdn" } else { "api" };
        format!(
            "https://{}.{host}.sanity.io/v{}/data/query/{}",
            self.config.project_id, self.config.api_version, self.config.dataset
        )
    }

    pub async fn fetch_templates(&self) -> anyhow::Result<TemplateCatalog> {
        let url = reqwest::Url::parse_with_params(&self.endpoint(), [("query", TEMPLATE_QUERY)])
            .context("Failed to build content store URL")?;

        tracing::debug!(url = %url, "Querying content store");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Content store request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read content store response")?;
        if !status.is_success() {
            anyhow::bail!("Content store returned {status}: {}", body.trim());
        }

        let catalog = parse_response(&body)?;
        tracing::info!(templates = catalog.templates.len(), "Fetched templates");
        Ok(catalog)
    }

    pub async fn fetch_template(&self, id: &str) -> anyhow::Result<TemplateRecord> {
        let catalog = self.fetch_templates().await?;
        catalog
            .find(id)
            .cloned()
            .with_context(|| format!("No template with id {id:?} in the content store"))
    }
}

fn parse_response(body: &str) -> anyhow::Result<TemplateCatalog> {
    let parsed: QueryResponse =
        serde_json::from_str(body).context("Failed to parse content store response")?;
    Ok(TemplateCatalog::new(parsed.result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_follows_cdn_flag() {
        let mut config = ContentStoreConfig::default();
        let store = ContentStore::new(&config, 5).unwrap();
        assert_eq!(
            store.endpoint(),
            "https://3ouodvma.apicdn.sanity.io/v2025-02-08/data/query/production"
        );

        config.use_cdn = false;
        let live = ContentStore::new(&config, 5).unwrap();
        assert!(live.endpoint().starts_with("https://3ouodvma.api.sanity.io/"));
    }

    #[test]
    fn test_parse_response_envelope() {
        let body = r#"{
            "query": "*",
            "result": [
                {"_id": "a", "title": "Beach", "duration": 12, "videos": []},
                {"_id": "b", "title": "City", "duration": "8", "tags": ["night"]}
            ],
            "ms": 4
        }"#;
        let catalog = parse_response(body).unwrap();
        assert_eq!(catalog.templates.len(), 2);
        assert_eq!(catalog.find("b").unwrap().duration, Some(8.0));
        assert!(parse_response("{}").is_err());
    }
}
