use std::sync::Arc;
use crate::cache::LookupCache;
use crate::config::Settings;
use crate::discogs::DiscogsClient;
use crate::extraction::ExtractionClient;
use crate::rate_limit::{AdmissionGate, Clock, SystemClock};
use crate::store::RecordStore;
// app's shared state

pub struct AppState {
    pub settings: Settings,
    pub gate: Arc<AdmissionGate>,   // per action + caller quotas
    pub records: RecordStore,
    pub discogs: DiscogsClient,
    pub lookup_cache: LookupCache,  // catalog number -> lookup response
    pub extractor: ExtractionClient,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    // Tests drive the rate limiter with their own clock
    pub fn with_clock(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let client = reqwest::Client::new();
        Self {
            gate: Arc::new(AdmissionGate::new(clock)),
            records: RecordStore::new(),
            discogs: DiscogsClient::new(
                client.clone(),
                settings.discogs_url.clone(),
                settings.discogs_token.clone(),
            ),
            lookup_cache: LookupCache::new(settings.discogs_cache_ttl),
            extractor: ExtractionClient::new(
                client,
                settings.vision_url.clone(),
                settings.vision_model.clone(),
                settings.vision_api_key.clone(),
                settings.extraction_timeout,
            ),
            settings,
        }
    }
}
