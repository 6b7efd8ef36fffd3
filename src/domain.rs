//! Data shapes shared by the normalizer, resolvers, assembler and storage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the source catalog, exactly as read. Every cell is an untyped string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub show_id: String,
    #[serde(rename = "type")]
    pub format: String,
    pub title: String,
    pub director: String,
    pub cast: String,
    pub country: String,
    pub date_added: String,
    pub release_year: String,
    pub rating: String,
    pub duration: String,
    pub listed_in: String,
    pub description: String,
}

/// Lookup tables that own a surrogate id and a unique natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Format,
    Director,
    Actor,
    Country,
    Rating,
    Release,
    Tag,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Format,
        EntityKind::Director,
        EntityKind::Actor,
        EntityKind::Country,
        EntityKind::Rating,
        EntityKind::Release,
        EntityKind::Tag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Format => "format",
            EntityKind::Director => "director",
            EntityKind::Actor => "actor",
            EntityKind::Country => "country",
            EntityKind::Rating => "rating",
            EntityKind::Release => "release",
            EntityKind::Tag => "tag",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Format => "content_format",
            EntityKind::Director => "director",
            EntityKind::Actor => "actor",
            EntityKind::Country => "country",
            EntityKind::Rating => "rating",
            EntityKind::Release => "release_date",
            EntityKind::Tag => "tag",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Format => "content_format_id",
            EntityKind::Director => "director_id",
            EntityKind::Actor => "actor_id",
            EntityKind::Country => "country_id",
            EntityKind::Rating => "rating_id",
            EntityKind::Release => "release_id",
            EntityKind::Tag => "tag_id",
        }
    }

    /// Column holding the natural key.
    pub fn key_column(&self) -> &'static str {
        match self {
            EntityKind::Format | EntityKind::Tag => "description",
            EntityKind::Release => "release_date",
            _ => "name",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Many-to-many join tables. Each edge is a (left, right) pair of foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    ContentDirector,
    ContentActor,
    ContentCountry,
    ContentRelease,
    ContentTag,
    GenreTag,
}

impl AssociationKind {
    pub const ALL: [AssociationKind; 6] = [
        AssociationKind::ContentDirector,
        AssociationKind::ContentActor,
        AssociationKind::ContentCountry,
        AssociationKind::ContentRelease,
        AssociationKind::ContentTag,
        AssociationKind::GenreTag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::ContentDirector => "content_director",
            AssociationKind::ContentActor => "content_actor",
            AssociationKind::ContentCountry => "content_country",
            AssociationKind::ContentRelease => "content_release",
            AssociationKind::ContentTag => "content_tag",
            AssociationKind::GenreTag => "genre_tag",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            AssociationKind::ContentDirector => "content_directors",
            AssociationKind::ContentActor => "content_actors",
            AssociationKind::ContentCountry => "content_country",
            AssociationKind::ContentRelease => "content_release",
            AssociationKind::ContentTag => "content_tags",
            AssociationKind::GenreTag => "genre_tags",
        }
    }

    /// Lookup table the right-hand side of an edge points into.
    pub fn target(&self) -> EntityKind {
        match self {
            AssociationKind::ContentDirector => EntityKind::Director,
            AssociationKind::ContentActor => EntityKind::Actor,
            AssociationKind::ContentCountry => EntityKind::Country,
            AssociationKind::ContentRelease => EntityKind::Release,
            AssociationKind::ContentTag | AssociationKind::GenreTag => EntityKind::Tag,
        }
    }

    /// Whether the left-hand side is a content id. Genre buckets are plain numbers.
    pub fn left_is_content(&self) -> bool {
        !matches!(self, AssociationKind::GenreTag)
    }

    pub fn left_column(&self) -> &'static str {
        match self {
            AssociationKind::GenreTag => "genre",
            _ => "content",
        }
    }

    pub fn right_column(&self) -> &'static str {
        match self {
            AssociationKind::ContentDirector => "director",
            AssociationKind::ContentActor => "actor",
            AssociationKind::ContentCountry => "country",
            AssociationKind::ContentRelease => "release",
            AssociationKind::ContentTag | AssociationKind::GenreTag => "tag",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one column of one record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Absent,
    Single(i64),
    Many(Vec<i64>),
}

impl Resolution {
    /// Every resolved id, in source order.
    pub fn ids(&self) -> Vec<i64> {
        match self {
            Resolution::Absent => Vec::new(),
            Resolution::Single(id) => vec![*id],
            Resolution::Many(ids) => ids.clone(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }
}

/// A row of the `content` anchor table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub content_id: i64,
    pub format: Option<i64>,
    pub title: Option<String>,
    pub director: Option<i64>,
    pub release_year: Option<i64>,
    pub rating: i64,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub genre: i64,
}
