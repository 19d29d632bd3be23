//! Taxonomic ranks
//!
//! The store models three ranks, strictly nested:
//! - `Family`: top of the hierarchy, no parent
//! - `Genus`: belongs to exactly one family
//! - `Species`: belongs to exactly one genus

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One level of the taxonomic hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Family,
    Genus,
    Species,
}

impl Rank {
    /// Get the string representation of the rank
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }

    /// Table holding records of this rank
    pub fn table(&self) -> &'static str {
        match self {
            Rank::Family => "families",
            Rank::Genus => "genera",
            Rank::Species => "species",
        }
    }

    /// The rank a record of this rank must reference, if any
    pub fn parent(&self) -> Option<Rank> {
        match self {
            Rank::Family => None,
            Rank::Genus => Some(Rank::Family),
            Rank::Species => Some(Rank::Genus),
        }
    }

    /// The rank whose records reference this one, if any
    pub fn child(&self) -> Option<Rank> {
        match self {
            Rank::Family => Some(Rank::Genus),
            Rank::Genus => Some(Rank::Species),
            Rank::Species => None,
        }
    }

    /// Get all ranks, top-down
    pub fn all() -> &'static [Rank] {
        &[Rank::Family, Rank::Genus, Rank::Species]
    }
}

impl FromStr for Rank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "family" => Ok(Rank::Family),
            "genus" => Ok(Rank::Genus),
            "species" => Ok(Rank::Species),
            _ => Err(Error::Validation(format!("Unknown rank: {}", s))),
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
