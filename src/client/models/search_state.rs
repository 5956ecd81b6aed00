use crate::client::services::search_service::{build_search_request, SearchBackend};
use crate::common::models::{ListingRecord, Segment};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Everything the search screen renders from: the committed query, fetch
/// status, last error, and the two result partitions.
#[derive(Debug, Clone, Default)]
pub struct SearchSnapshot {
    pub segment: Segment,
    /// The trimmed term the in-flight/last search actually used, so the UI
    /// can say "no results for X" even while typing has moved on.
    pub applied_query: String,
    pub is_fetching: bool,
    pub has_searched: bool,
    pub error_message: Option<String>,
    pub travel_listings: Vec<ListingRecord>,
    pub shipment_listings: Vec<ListingRecord>,
}

/// Screen-lifetime search state. Overlapping `perform_search` calls are
/// resolved with a generation counter: only the most recently started call
/// may apply its response, so a slow early response can never overwrite a
/// faster later one.
#[derive(Default)]
pub struct SearchSession {
    state: Mutex<SearchSnapshot>,
    generation: AtomicU64,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SearchSnapshot {
        self.state.lock().await.clone()
    }

    /// Run one search against the backend. Failures surface as an error
    /// string on the snapshot; there is no automatic retry, the user
    /// re-triggers by searching again.
    pub async fn perform_search<B: SearchBackend>(
        &self,
        backend: &B,
        term: &str,
        segment_override: Option<Segment>,
    ) {
        // The ticket is taken under the same lock as the start-phase
        // mutations, so a call holding a newer ticket can never have its
        // applied query overwritten by an older call starting late.
        let (ticket, request) = {
            let mut state = self.state.lock().await;
            let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(segment) = segment_override {
                state.segment = segment;
            }
            state.is_fetching = true;
            state.error_message = None;
            state.applied_query = term.trim().to_string();
            (ticket, build_search_request(term, state.segment))
        };

        let outcome = backend.search(request).await;

        let mut state = self.state.lock().await;
        if ticket != self.generation.load(Ordering::SeqCst) {
            // A newer search superseded this one; drop the response
            log::debug!("[SEARCH] Dropping stale response for '{}'", term.trim());
            return;
        }

        match outcome {
            Ok(response) => {
                state.travel_listings = response.travellers;
                state.shipment_listings = response.shipments;
            }
            Err(e) => {
                log::warn!("[SEARCH] Search failed: {}", e);
                state.travel_listings.clear();
                state.shipment_listings.clear();
                state.error_message = Some(format!("Search failed: {}", e));
            }
        }
        state.has_searched = true;
        state.is_fetching = false;
    }
}
