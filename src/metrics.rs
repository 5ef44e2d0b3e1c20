use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("crate_digger_requests_total", "Total number of gated API requests").unwrap();
    pub static ref ADMISSIONS: CounterVec = register_counter_vec!(
        "crate_digger_rate_limit_admitted_total",
        "Requests admitted by the rate limiter",
        &["action"]
    )
    .unwrap();
    pub static ref DENIALS: CounterVec = register_counter_vec!(
        "crate_digger_rate_limit_denied_total",
        "Requests rejected by the rate limiter",
        &["action"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_KEYS: Gauge = register_gauge!(
        "crate_digger_rate_limit_keys",
        "Rate limit windows currently tracked"
    )
    .unwrap();
    pub static ref LOOKUP_CACHE_HITS: Counter =
        register_counter!("crate_digger_lookup_cache_hits_total", "Discogs lookup cache hits").unwrap();
    pub static ref LOOKUP_CACHE_MISSES: Counter =
        register_counter!("crate_digger_lookup_cache_misses_total", "Discogs lookup cache misses").unwrap();
    pub static ref EXTRACTION_LATENCY: Histogram = register_histogram!(
        "crate_digger_extraction_latency_seconds",
        "Vision model extraction latency in seconds"
    )
    .unwrap();
}

// Prometheus text exposition of every registered metric
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
