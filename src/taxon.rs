//! Taxon records - Family, Genus, Species
//!
//! Records reference their parent by identifier only. The store keeps one
//! table per rank keyed by id, so integrity checks are plain key lookups.

use crate::{Error, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest conservation-status code accepted (IUCN codes are 2 letters,
/// regional schemes such as "S2S3" or "G5T3Q" a little longer).
pub const MAX_STATUS_LEN: usize = 16;

/// A botanical family. Top of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    /// Unique identifier for the family
    pub id: Uuid,
    /// Scientific name, e.g. "Rosaceae"
    pub name: String,
    /// Who first described the family (may be empty)
    pub authority: String,
}

impl Family {
    /// Create a new family with a random identifier
    pub fn new(name: impl Into<String>, authority: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name, authority)
    }

    /// Create a family with a caller-chosen identifier
    pub fn with_id(id: Uuid, name: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            authority: authority.into(),
        }
    }

    /// Check the fields a family must carry before it can be stored
    pub fn validate(&self) -> Result<()> {
        require_text("family name", &self.name)
    }
}

/// A genus within a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genus {
    /// Unique identifier for the genus
    pub id: Uuid,
    /// Owning family
    pub family_id: Uuid,
    /// Genus name, e.g. "Rosa"
    pub name: String,
    /// Who first described the genus (may be empty)
    pub authority: String,
}

impl Genus {
    /// Create a new genus with a random identifier
    pub fn new(family_id: Uuid, name: impl Into<String>, authority: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), family_id, name, authority)
    }

    /// Create a genus with a caller-chosen identifier
    pub fn with_id(
        id: Uuid,
        family_id: Uuid,
        name: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            id,
            family_id,
            name: name.into(),
            authority: authority.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("genus name", &self.name)
    }
}

/// A species within a genus.
///
/// The specific epithet is only the second half of the binomial; the full
/// name needs the owning genus (see [`Lineage::binomial`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    /// Unique identifier for the species
    pub id: Uuid,
    /// Owning genus
    pub genus_id: Uuid,
    /// The specific epithet, e.g. "rubiginosa"
    pub specific_epithet: String,
    /// Who first described the species (may be empty)
    pub authority: String,
    /// Year the species was first published
    pub publication_year: Option<i32>,
    /// Conservation status code (IUCN "LC", "EN", ... or a regional scheme)
    pub conservation_status: Option<String>,
}

impl Species {
    /// Create a new species with a random identifier
    pub fn new(
        genus_id: Uuid,
        specific_epithet: impl Into<String>,
        authority: impl Into<String>,
        publication_year: Option<i32>,
        conservation_status: Option<String>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            genus_id,
            specific_epithet,
            authority,
            publication_year,
            conservation_status,
        )
    }

    /// Create a species with a caller-chosen identifier
    pub fn with_id(
        id: Uuid,
        genus_id: Uuid,
        specific_epithet: impl Into<String>,
        authority: impl Into<String>,
        publication_year: Option<i32>,
        conservation_status: Option<String>,
    ) -> Self {
        Self {
            id,
            genus_id,
            specific_epithet: specific_epithet.into(),
            authority: authority.into(),
            publication_year,
            conservation_status,
        }
    }

    /// Check epithet, year and status
    pub fn validate(&self) -> Result<()> {
        require_text("specific epithet", &self.specific_epithet)?;

        if let Some(year) = self.publication_year {
            let current = chrono::Utc::now().year();
            if year < 1 || year > current {
                return Err(Error::Validation(format!(
                    "publication year {} is outside 1..={}",
                    year, current
                )));
            }
        }

        if let Some(status) = &self.conservation_status {
            require_text("conservation status", status)?;
            if status.chars().count() > MAX_STATUS_LEN {
                return Err(Error::Validation(format!(
                    "conservation status '{}' is longer than {} characters",
                    status, MAX_STATUS_LEN
                )));
            }
        }

        Ok(())
    }

    pub fn has_conservation_status(&self) -> bool {
        self.conservation_status.is_some()
    }
}

/// A species together with its genus and family, resolved from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub family: Family,
    pub genus: Genus,
    pub species: Species,
}

impl Lineage {
    /// Binomial name: "Rosa rubiginosa"
    pub fn binomial(&self) -> String {
        format!("{} {}", self.genus.name, self.species.specific_epithet)
    }

    /// Binomial followed by the species authority when one is recorded
    pub fn scientific_name(&self) -> String {
        if self.species.authority.trim().is_empty() {
            self.binomial()
        } else {
            format!("{} {}", self.binomial(), self.species.authority)
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
