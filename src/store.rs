//! Owner-scoped record storage.
//!
//! In-process stand-in for the relational store. Every operation takes the
//! owner id; records of other users behave exactly like missing ones.

use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use crate::models::{NewRecord, Record, RecordPatch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("A record with this information already exists")]
    Duplicate,
}

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: HashMap<i64, Record>,
}

impl Table {
    // Same owner, title, artist and catalog number, ignoring case
    fn conflicts(&self, user_id: &str, candidate: &Record) -> bool {
        let norm = |s: &str| s.to_lowercase();
        let norm_opt = |s: &Option<String>| s.as_deref().map(norm);
        self.rows.values().any(|r| {
            r.id != candidate.id
                && r.user_id == user_id
                && norm(&r.title) == norm(&candidate.title)
                && norm(&r.artist) == norm(&candidate.artist)
                && norm_opt(&r.catalog_number) == norm_opt(&candidate.catalog_number)
        })
    }
}

#[derive(Default)]
pub struct RecordStore {
    table: RwLock<Table>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Newest first
    pub async fn list(&self, user_id: &str) -> Vec<Record> {
        let table = self.table.read().await;
        let mut records: Vec<Record> = table
            .rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }

    pub async fn create(&self, new: NewRecord, user_id: &str) -> Result<Record, StoreError> {
        let mut table = self.table.write().await;
        let now = Utc::now();
        let record = Record {
            id: table.next_id + 1,
            title: new.title,
            artist: new.artist,
            album: new.album,
            year: new.year,
            genre: new.genre,
            label: new.label,
            catalog_number: new.catalog_number,
            condition: new.condition,
            notes: new.notes,
            image_url: new.image_url,
            purchase_price: new.purchase_price,
            purchase_date: new.purchase_date,
            purchase_location: new.purchase_location,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        if table.conflicts(user_id, &record) {
            return Err(StoreError::Duplicate);
        }
        table.next_id = record.id;
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: i64, user_id: &str) -> Option<Record> {
        let table = self.table.read().await;
        table.rows.get(&id).filter(|r| r.user_id == user_id).cloned()
    }

    pub async fn update(
        &self,
        id: i64,
        patch: RecordPatch,
        user_id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let mut table = self.table.write().await;
        let Some(mut updated) = table.rows.get(&id).filter(|r| r.user_id == user_id).cloned() else {
            return Ok(None);
        };
        updated.apply(patch, Utc::now());
        if table.conflicts(user_id, &updated) {
            return Err(StoreError::Duplicate);
        }
        table.rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    // Returns the removed record, None when the caller does not own it
    pub async fn delete(&self, id: i64, user_id: &str) -> Option<Record> {
        let mut table = self.table.write().await;
        if table.rows.get(&id).is_some_and(|r| r.user_id == user_id) {
            table.rows.remove(&id)
        } else {
            None
        }
    }
}
