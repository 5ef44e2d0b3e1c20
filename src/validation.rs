//! Field rules for record bodies.

use chrono::{Datelike, Utc};
use crate::error::FieldError;
use crate::models::{NewRecord, RecordInput, RecordPatch};

const MIN_YEAR: i32 = 1900;

// Trimmed value, empty strings count as absent
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>, max: usize, message: &str) {
    if value.as_ref().is_some_and(|v| v.chars().count() > max) {
        errors.push(FieldError::new(field, message));
    }
}

fn check_year(errors: &mut Vec<FieldError>, year: Option<i32>) {
    let max = Utc::now().year() + 1;
    if year.is_some_and(|y| !(MIN_YEAR..=max).contains(&y)) {
        errors.push(FieldError::new(
            "year",
            format!("Year must be between {MIN_YEAR} and {max}"),
        ));
    }
}

pub fn validate_new_record(input: RecordInput) -> Result<NewRecord, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = clean(input.title);
    let artist = clean(input.artist);
    let album = clean(input.album);
    let genre = clean(input.genre);
    let label = clean(input.label);
    let catalog_number = clean(input.catalog_number);
    let notes = clean(input.notes);
    let image_url = clean(input.image_url);
    let purchase_date = clean(input.purchase_date);
    let purchase_location = clean(input.purchase_location);

    if title.is_none() {
        errors.push(FieldError::new("title", "Title is required"));
    }
    check_len(&mut errors, "title", &title, 200, "Title too long");
    if artist.is_none() {
        errors.push(FieldError::new("artist", "Artist is required"));
    }
    check_len(&mut errors, "artist", &artist, 200, "Artist too long");
    check_len(&mut errors, "album", &album, 200, "Album name too long");
    check_year(&mut errors, input.year);
    check_len(&mut errors, "genre", &genre, 100, "Genre too long");
    check_len(&mut errors, "label", &label, 100, "Label too long");
    check_len(&mut errors, "catalog_number", &catalog_number, 50, "Catalog number too long");
    check_len(&mut errors, "notes", &notes, 1000, "Notes too long");
    check_len(&mut errors, "image_url", &image_url, 2048, "Image URL too long");
    if input
        .purchase_price
        .is_some_and(|p| !p.is_finite() || p < 0.0)
    {
        errors.push(FieldError::new("purchase_price", "Purchase price cannot be negative"));
    }
    check_len(
        &mut errors,
        "purchase_location",
        &purchase_location,
        200,
        "Purchase location too long",
    );

    match (title, artist) {
        (Some(title), Some(artist)) if errors.is_empty() => Ok(NewRecord {
            title,
            artist,
            album,
            year: input.year,
            genre,
            label,
            catalog_number,
            condition: input.condition,
            notes,
            image_url,
            purchase_price: input.purchase_price,
            purchase_date,
            purchase_location,
        }),
        _ => Err(errors),
    }
}

// Same limits as creation, applied only to the fields being changed
pub fn validate_patch(patch: RecordPatch) -> Result<RecordPatch, Vec<FieldError>> {
    let mut errors = Vec::new();

    if patch.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
        errors.push(FieldError::new("title", "Title is required"));
    }
    if patch.artist.as_ref().is_some_and(|a| a.trim().is_empty()) {
        errors.push(FieldError::new("artist", "Artist is required"));
    }

    let patch = RecordPatch {
        title: clean(patch.title),
        artist: clean(patch.artist),
        album: clean(patch.album),
        genre: clean(patch.genre),
        label: clean(patch.label),
        catalog_number: clean(patch.catalog_number),
        notes: clean(patch.notes),
        image_url: clean(patch.image_url),
        ..patch
    };

    check_len(&mut errors, "title", &patch.title, 200, "Title too long");
    check_len(&mut errors, "artist", &patch.artist, 200, "Artist too long");
    check_len(&mut errors, "album", &patch.album, 200, "Album name too long");
    check_year(&mut errors, patch.year);
    check_len(&mut errors, "genre", &patch.genre, 100, "Genre too long");
    check_len(&mut errors, "label", &patch.label, 100, "Label too long");
    check_len(&mut errors, "catalog_number", &patch.catalog_number, 50, "Catalog number too long");
    check_len(&mut errors, "notes", &patch.notes, 1000, "Notes too long");
    check_len(&mut errors, "image_url", &patch.image_url, 2048, "Image URL too long");

    if errors.is_empty() { Ok(patch) } else { Err(errors) }
}
