//! Record assembly: resolved fields -> content row plus association targets.

use crate::constants::{GENRE_BUCKETS, MULTIPLE_DIRECTORS_ID, NEEDS_REVISION_RATING_ID};
use crate::domain::{Content, Resolution};
use crate::normalize::NormalizedRecord;

/// Placeholder category assignment: `(content_id mod 9) + 1`. Not derived from
/// the title's actual metadata.
pub fn genre_bucket(content_id: i64) -> i64 {
    content_id.rem_euclid(GENRE_BUCKETS) + 1
}

/// Per-column resolutions for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    pub format: Resolution,
    pub directors: Resolution,
    pub cast: Resolution,
    pub countries: Resolution,
    pub release: Resolution,
    pub rating: Resolution,
    pub tags: Resolution,
}

/// Ids to link to a content row once all anchors exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationTargets {
    pub content_id: i64,
    pub genre: i64,
    /// Only filled when the content's director slot holds the sentinel.
    pub directors: Vec<i64>,
    pub actors: Vec<i64>,
    pub countries: Vec<i64>,
    pub releases: Vec<i64>,
    pub tags: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRecord {
    pub content: Content,
    pub targets: AssociationTargets,
}

pub fn assemble(record: &NormalizedRecord, resolved: &ResolvedFields) -> AssembledRecord {
    let genre = genre_bucket(record.content_id);
    let (director, directors) = director_slot(&resolved.directors);

    let content = Content {
        content_id: record.content_id,
        format: resolved.format.ids().first().copied(),
        title: record.title.clone(),
        director,
        release_year: record.release_year,
        rating: resolved
            .rating
            .ids()
            .first()
            .copied()
            .unwrap_or(NEEDS_REVISION_RATING_ID),
        duration: record.duration.clone(),
        description: record.description.clone(),
        genre,
    };

    let targets = AssociationTargets {
        content_id: record.content_id,
        genre,
        directors,
        actors: resolved.cast.ids(),
        countries: resolved.countries.ids(),
        releases: resolved.release.ids(),
        tags: resolved.tags.ids(),
    };

    AssembledRecord { content, targets }
}

/// Director column value plus the directors that need join rows.
///
/// One distinct director goes straight into the slot. Two or more put the
/// sentinel in the slot and are linked through content_directors instead.
fn director_slot(resolution: &Resolution) -> (Option<i64>, Vec<i64>) {
    let mut distinct: Vec<i64> = Vec::new();
    for id in resolution.ids() {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }
    match distinct.as_slice() {
        [] => (None, Vec::new()),
        [only] => (Some(*only), Vec::new()),
        _ => (Some(MULTIPLE_DIRECTORS_ID), distinct),
    }
}
