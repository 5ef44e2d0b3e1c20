//! Discogs catalog-number lookup.
//!
//! Searches the Discogs database for releases carrying a catalog number and
//! reshapes them into the fields the record form understands.

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const USER_AGENT: &str = concat!("crate-digger/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.discogs.v2.plaintext+json";
const PER_PAGE: &str = "10";

#[derive(Error, Debug)]
pub enum DiscogsError {
    #[error("invalid Discogs url: {0}")]
    Url(String),
    #[error("Discogs answered {0}")]
    Status(StatusCode),
    #[error("Discogs request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// One release as returned by /database/search
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DiscogsRelease {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "year_from_any")]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default)]
    pub label: Vec<String>,
    pub catno: Option<String>,
    #[serde(default)]
    pub format: Vec<String>,
    pub country: Option<String>,
    pub thumb: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchPagination {
    #[serde(default)]
    items: u64,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<DiscogsRelease>,
    #[serde(default)]
    pagination: SearchPagination,
}

// Release reshaped into record form fields
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub genre: String,
    pub label: String,
    pub catalog_number: String,
    pub format: String,
    pub country: String,
    pub image_url: String,
    pub discogs_id: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub success: bool,
    pub results: Vec<LookupResult>,
    pub total: u64,
}

// Discogs sends the year as a string in search results and a number elsewhere
fn year_from_any<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|y| *y > 0))
}

impl LookupResult {
    pub fn from_release(release: DiscogsRelease, catno: &str) -> Self {
        // search titles read "Artist - Album"
        let mut parts = release.title.splitn(2, " - ");
        let artist = parts.next().unwrap_or_default().to_string();
        let album = parts
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| release.title.clone());

        let first = |values: Vec<String>| values.into_iter().next().unwrap_or_default();

        Self {
            id: release.id,
            artist,
            album,
            year: release.year,
            genre: first(release.genre),
            label: first(release.label),
            catalog_number: release
                .catno
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| catno.to_string()),
            format: first(release.format),
            country: release.country.unwrap_or_default(),
            image_url: release
                .cover_image
                .filter(|u| !u.is_empty())
                .or(release.thumb)
                .unwrap_or_default(),
            discogs_id: release.id,
            title: release.title,
        }
    }
}

#[derive(Clone)]
pub struct DiscogsClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DiscogsClient {
    pub fn new(client: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    pub async fn search(&self, catno: &str) -> Result<LookupResponse, DiscogsError> {
        let url = Url::parse_with_params(
            &format!("{}/database/search", self.base_url),
            &[("catno", catno), ("type", "release"), ("per_page", PER_PAGE)],
        )
        .map_err(|e| DiscogsError::Url(e.to_string()))?;

        let mut request = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Discogs token={token}"));
        }

        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(DiscogsError::Status(res.status()));
        }
        let body: SearchResponse = res.json().await?;

        tracing::debug!(releases = body.results.len(), "Discogs search finished");

        Ok(LookupResponse {
            success: true,
            total: body.pagination.items,
            results: body
                .results
                .into_iter()
                .map(|r| LookupResult::from_release(r, catno))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_artist_and_album() {
        let release: DiscogsRelease = serde_json::from_value(serde_json::json!({
            "id": 249504,
            "title": "Rick Astley - Never Gonna Give You Up",
            "year": "1987",
            "genre": ["Electronic", "Pop"],
            "label": ["RCA", "BMG"],
            "catno": "PB 41447",
            "format": ["Vinyl", "7\""],
            "country": "UK",
            "thumb": "https://img/thumb.jpg",
            "cover_image": "https://img/cover.jpg"
        }))
        .unwrap();

        let result = LookupResult::from_release(release, "pb41447");
        assert_eq!(result.artist, "Rick Astley");
        assert_eq!(result.album, "Never Gonna Give You Up");
        assert_eq!(result.year, Some(1987));
        assert_eq!(result.genre, "Electronic");
        assert_eq!(result.label, "RCA");
        assert_eq!(result.catalog_number, "PB 41447");
        assert_eq!(result.format, "Vinyl");
        assert_eq!(result.image_url, "https://img/cover.jpg");
        assert_eq!(result.discogs_id, 249504);
    }

    #[test]
    fn falls_back_when_fields_missing() {
        let release: DiscogsRelease = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Untitled",
            "year": 0,
            "thumb": "https://img/thumb.jpg"
        }))
        .unwrap();

        let result = LookupResult::from_release(release, "XYZ-1");
        assert_eq!(result.artist, "Untitled");
        assert_eq!(result.album, "Untitled");
        assert_eq!(result.year, None);
        assert_eq!(result.catalog_number, "XYZ-1");
        assert_eq!(result.image_url, "https://img/thumb.jpg");
        assert_eq!(result.genre, "");
    }

    #[test]
    fn parses_search_payload() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results": [{"id": 7, "title": "A - B", "year": 1970}], "pagination": {"items": 42, "page": 1, "pages": 5, "per_page": 10}}"#,
        )
        .unwrap();
        assert_eq!(body.pagination.items, 42);
        assert_eq!(body.results[0].year, Some(1970));
    }
}
