//! OSINT capability built on an external web-search service (any
//! SearxNG-compatible JSON endpoint). Two modules share the client:
//! `DomainSearch` harvests hostnames from result links and feeds them back
//! into the knowledge base as new targets; `SocialSearch` collects
//! social-media profile links as intelligence.

use anyhow::Result;
use async_trait::async_trait;
use cortex_core::OsintModule;
use knowledge_store::{Db, TargetStatus};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Base URL of the search service; absent means the capability is
    /// unavailable and modules report no results.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            endpoint: None,
            timeout_ms: 10_000,
            user_agent: format!("cortex/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl SearchClient {
    pub fn new(opts: &SearchOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(opts.timeout_ms))
            .user_agent(opts.user_agent.clone())
            .build()?;
        Ok(SearchClient {
            http,
            endpoint: opts.endpoint.clone(),
        })
    }

    /// Issue one query. A missing endpoint is "no results", not an error.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let Some(endpoint) = &self.endpoint else {
            warn!("no search endpoint configured; web search capability is unavailable");
            return Ok(Vec::new());
        };
        let response = self
            .http
            .get(format!("{}/search", endpoint.trim_end_matches('/')))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }
}

/// Extract unique hostnames from result links, in first-seen order.
pub fn hostnames_from_hits(hits: &[SearchHit]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for hit in hits {
        match url::Url::parse(&hit.url) {
            Ok(parsed) => {
                if let Some(host) = parsed.host_str() {
                    if seen.insert(host.to_string()) {
                        out.push(host.to_string());
                    }
                }
            }
            Err(e) => debug!(url = %hit.url, error = %e, "unparseable result link"),
        }
    }
    out
}

pub struct DomainSearch {
    client: SearchClient,
}

impl DomainSearch {
    pub fn new(client: SearchClient) -> Self {
        DomainSearch { client }
    }
}

#[async_trait]
impl OsintModule for DomainSearch {
    fn name(&self) -> &str {
        "domain_search"
    }

    async fn run(&self, db: &Db, query: &str) -> Result<()> {
        info!(query, "running web search");
        let hits = self.client.search(query).await?;
        if hits.is_empty() {
            info!(query, "no search results");
            return Ok(());
        }
        let hostnames = hostnames_from_hits(&hits);
        info!(count = hostnames.len(), "potential hostnames harvested from search");
        for hostname in hostnames {
            match db.get_target(&hostname) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(hostname, "discovered new potential target via OSINT");
                    db.upsert_target(&hostname, None, TargetStatus::New)?;
                }
                Err(e) => error!(hostname, error = %e, "target lookup failed"),
            }
        }
        Ok(())
    }
}

pub const SOCIAL_SITES: &[&str] = &["linkedin.com", "twitter.com", "facebook.com", "github.com"];

pub struct SocialSearch {
    client: SearchClient,
}

impl SocialSearch {
    pub fn new(client: SearchClient) -> Self {
        SocialSearch { client }
    }
}

#[async_trait]
impl OsintModule for SocialSearch {
    fn name(&self) -> &str {
        "social_search"
    }

    async fn run(&self, db: &Db, query: &str) -> Result<()> {
        info!(query, "searching for related social media profiles");
        let target_id = db.get_target(query).ok().flatten().map(|t| t.id);
        for site in SOCIAL_SITES {
            let scoped = format!("site:{site} \"{query}\"");
            let hits = match self.client.search(&scoped).await {
                Ok(hits) => hits,
                Err(e) => {
                    error!(site, error = %e, "social search failed");
                    continue;
                }
            };
            for hit in hits {
                db.add_intelligence(&hit.url, "social_media_profile", self.name(), target_id)?;
            }
        }
        Ok(())
    }
}
