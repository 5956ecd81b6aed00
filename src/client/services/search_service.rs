use crate::common::models::{LocationResponse, SearchResponse, Segment};
use crate::server::config::ClientConfig;
use std::future::Future;

/// Normalized backend query built from the raw search box contents.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Omitted entirely when the raw query trims to empty, so the server can
    /// tell "no filter" apart from "filter on empty string".
    pub q: Option<String>,
    pub segment: Segment,
}

pub fn build_search_request(raw_query: &str, segment: Segment) -> SearchRequest {
    let trimmed = raw_query.trim();
    SearchRequest {
        q: if trimmed.is_empty() { None } else { Some(trimmed.to_string()) },
        segment,
    }
}

/// Seam between the search session and the network, so the session logic can
/// be exercised against stub backends.
pub trait SearchBackend {
    fn search(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = anyhow::Result<SearchResponse>> + Send;
}

/// HTTP implementation hitting the marketplace server.
pub struct HttpSearchBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSearchBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.server_base_url)
    }

    pub async fn lookup_locations(&self, q: &str) -> anyhow::Result<LocationResponse> {
        let mut url = url::Url::parse(&format!("{}/api/location", self.base_url))?;
        if !q.trim().is_empty() {
            url.query_pairs_mut().append_pair("q", q.trim());
        }

        let response = self.http.get(url.as_str()).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("location endpoint returned {}", response.status());
        }
        Ok(response.json().await?)
    }
}

impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: SearchRequest) -> anyhow::Result<SearchResponse> {
        let mut url = url::Url::parse(&format!("{}/search", self.base_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(q) = &request.q {
                pairs.append_pair("q", q);
            }
            pairs.append_pair("segment", request.segment.as_str());
        }

        log::debug!("[SEARCH] GET {}", url);
        let response = self.http.get(url.as_str()).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("search endpoint returned {}", response.status());
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_omitted() {
        let request = build_search_request("", Segment::All);
        assert_eq!(request.q, None);

        let request = build_search_request("   ", Segment::Routes);
        assert_eq!(request.q, None);
        assert_eq!(request.segment, Segment::Routes);
    }

    #[test]
    fn query_is_trimmed_not_rewritten() {
        let request = build_search_request("  JFK  ", Segment::Items);
        assert_eq!(request.q.as_deref(), Some("JFK"));
        assert_eq!(request.segment, Segment::Items);
    }

    #[test]
    fn segment_passes_through_unchanged() {
        for segment in [Segment::Routes, Segment::Items, Segment::All] {
            assert_eq!(build_search_request("x", segment).segment, segment);
        }
    }
}
