use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Grading scale used by collectors
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Mint,
    #[serde(rename = "Near Mint")]
    NearMint,
    #[serde(rename = "Very Good Plus")]
    VeryGoodPlus,
    #[serde(rename = "Very Good")]
    VeryGood,
    #[serde(rename = "Good Plus")]
    GoodPlus,
    Good,
    Fair,
    Poor,
}

// Stored record, always owned by one user
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub purchase_location: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Body of POST /api/records. Everything is optional here so validation can
// report every missing field at once instead of failing on the first.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RecordInput {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub purchase_location: Option<String>,
}

// Validated fields for a new record
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub purchase_location: Option<String>,
}

// Body of PUT /api/records/{id}; absent fields keep their stored value
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

impl Record {
    pub fn apply(&mut self, patch: RecordPatch, now: DateTime<Utc>) {
        fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(artist) = patch.artist {
            self.artist = artist;
        }
        merge(&mut self.album, patch.album);
        merge(&mut self.year, patch.year);
        merge(&mut self.genre, patch.genre);
        merge(&mut self.label, patch.label);
        merge(&mut self.catalog_number, patch.catalog_number);
        merge(&mut self.condition, patch.condition);
        merge(&mut self.notes, patch.notes);
        merge(&mut self.image_url, patch.image_url);
        self.updated_at = now;
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

// Response of GET /api/records
#[derive(Serialize, Debug, Clone)]
pub struct RecordList {
    pub records: Vec<Record>,
    pub pagination: Pagination,
}

impl RecordList {
    // Everything on one page
    pub fn single_page(records: Vec<Record>) -> Self {
        let total = records.len();
        Self {
            records,
            pagination: Pagination {
                page: 1,
                limit: total,
                total,
                total_pages: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_uses_collector_spelling() {
        let c: Condition = serde_json::from_str("\"Very Good Plus\"").unwrap();
        assert_eq!(c, Condition::VeryGoodPlus);
        assert_eq!(serde_json::to_string(&Condition::NearMint).unwrap(), "\"Near Mint\"");
        assert!(serde_json::from_str::<Condition>("\"Scratched\"").is_err());
    }

    #[test]
    fn patch_keeps_absent_fields() {
        let created = Utc::now();
        let mut record = Record {
            id: 1,
            title: "Blue Train".into(),
            artist: "John Coltrane".into(),
            album: None,
            year: Some(1957),
            genre: Some("Jazz".into()),
            label: Some("Blue Note".into()),
            catalog_number: Some("BLP 1577".into()),
            condition: None,
            notes: None,
            image_url: None,
            purchase_price: None,
            purchase_date: None,
            purchase_location: None,
            user_id: "u".into(),
            created_at: created,
            updated_at: created,
        };
        let later = created + chrono::Duration::seconds(5);
        record.apply(
            RecordPatch {
                condition: Some(Condition::Good),
                notes: Some("ring wear".into()),
                ..Default::default()
            },
            later,
        );
        assert_eq!(record.title, "Blue Train");
        assert_eq!(record.label.as_deref(), Some("Blue Note"));
        assert_eq!(record.condition, Some(Condition::Good));
        assert_eq!(record.notes.as_deref(), Some("ring wear"));
        assert_eq!(record.updated_at, later);
        assert_eq!(record.created_at, created);
    }

    #[test]
    fn list_serializes_pagination() {
        let json = serde_json::to_value(RecordList::single_page(Vec::new())).unwrap();
        assert_eq!(json["pagination"]["totalPages"], 1);
        assert_eq!(json["pagination"]["total"], 0);
    }
}
