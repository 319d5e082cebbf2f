//! # Catalog records
//!
//! - [`Record`] - a hydrated catalog entry, decoded from the detail endpoint
//! - [`RecordList`] - one page from the listing endpoint
//! - [`RecordRef`] - a summary reference inside a page, used to build the detail path
//!
//! Only `id` and `name` drive list behavior. The remaining fields are
//! descriptive and decoded leniently, so a payload missing them still decodes.

use serde::{Deserialize, Serialize};

use crate::{Result, error::PokedexError};

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    /// Stable identifier, used for identity and ordering
    pub id: u32,

    /// Display name (lowercase in the public catalog, e.g. "bulbasaur")
    pub name: String,

    /// Height in decimetres
    #[serde(default)]
    pub height: u32,

    /// Weight in hectograms
    #[serde(default)]
    pub weight: u32,

    #[serde(default)]
    pub base_experience: Option<u32>,

    #[serde(default)]
    pub types: Vec<TypeSlot>,

    #[serde(default)]
    pub sprites: Sprites,
}

impl Record {
    /// Names of this record's types in slot order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut slots: Vec<&TypeSlot> = self.types.iter().collect();
        slots.sort_by_key(|slot| slot.slot);
        slots.iter().map(|slot| slot.kind.name.as_str()).collect()
    }

    /// Preferred image url, if the catalog has one.
    pub fn image_url(&self) -> Option<&str> {
        self.sprites.front_default.as_deref()
    }
}

/// Named link to another catalog resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamedResource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypeSlot {
    pub slot: u32,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sprites {
    #[serde(default)]
    pub front_default: Option<String>,
    #[serde(default)]
    pub back_default: Option<String>,
    #[serde(default)]
    pub front_shiny: Option<String>,
}

/// Summary reference returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecordRef {
    pub name: String,
    pub url: String,
}

impl RecordRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Parses the id from the last non-empty path segment of `url`,
    /// e.g. `https://pokeapi.co/api/v2/pokemon/25/` -> 25.
    pub fn id(&self) -> Result<u32> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse::<u32>().ok())
            .ok_or_else(|| PokedexError::InvalidRef {
                url: self.url.clone(),
            })
    }
}

/// One page of summary references.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecordList {
    /// Total number of records the server knows about
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<RecordRef>,
}

impl RecordList {
    /// Returns the number of references in this page.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if this page has no references.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordRef> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a RecordList {
    type Item = &'a RecordRef;
    type IntoIter = std::slice::Iter<'a, RecordRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
