//! SQLite storage implementation
//!
//! Synchronous row-level operations over a borrowed connection. Writers
//! call these inside the pool's write transaction, so a parent check and
//! the insert that depends on it see the same snapshot.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;
use crate::rank::Rank;
use crate::taxon::{Family, Genus, Lineage, Species};
use crate::{Error, Result};
use super::migrate;

const FAMILY_COLUMNS: &str = "id, name, authority";
const GENUS_COLUMNS: &str = "id, family_id, name, authority";
const SPECIES_COLUMNS: &str =
    "id, genus_id, specific_epithet, authority, publication_year, conservation_status";

/// Where an identifier is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdUse {
    /// A live record of this rank
    Live(Rank),
    /// Deleted earlier; the rank it belonged to
    Retired(Rank),
}

/// SQLite-backed storage for the three rank tables
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ========== Identity ==========

    /// Find any live or retired use of `id`, across all ranks
    pub fn id_use(&self, id: Uuid) -> Result<Option<IdUse>> {
        let key = id.to_string();
        for rank in Rank::all() {
            if self.exists(*rank, id)? {
                return Ok(Some(IdUse::Live(*rank)));
            }
        }

        let retired: Option<String> = self
            .conn
            .query_row("SELECT rank FROM retired_ids WHERE id = ?1", [&key], |row| row.get(0))
            .optional()?;
        match retired {
            Some(rank) => Ok(Some(IdUse::Retired(rank.parse()?))),
            None => Ok(None),
        }
    }

    /// Whether a live record of `rank` has this id
    pub fn exists(&self, rank: Rank, id: Uuid) -> Result<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = ?1)", rank.table());
        let found: bool = self.conn.query_row(&sql, [id.to_string()], |row| row.get(0))?;
        Ok(found)
    }

    /// Number of live records of the rank below `rank` that reference `id`
    pub fn count_children(&self, rank: Rank, id: Uuid) -> Result<usize> {
        let sql = match rank {
            Rank::Family => "SELECT COUNT(*) FROM genera WHERE family_id = ?1",
            Rank::Genus => "SELECT COUNT(*) FROM species WHERE genus_id = ?1",
            Rank::Species => return Ok(0),
        };
        let count: i64 = self.conn.query_row(sql, [id.to_string()], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Writes ==========

    pub fn insert_family(&self, family: &Family) -> Result<()> {
        self.conn.execute(
            "INSERT INTO families (id, name, authority) VALUES (?1, ?2, ?3)",
            params![family.id.to_string(), family.name, family.authority],
        )?;
        Ok(())
    }

    pub fn insert_genus(&self, genus: &Genus) -> Result<()> {
        self.conn.execute(
            "INSERT INTO genera (id, family_id, name, authority) VALUES (?1, ?2, ?3, ?4)",
            params![
                genus.id.to_string(),
                genus.family_id.to_string(),
                genus.name,
                genus.authority,
            ],
        )?;
        Ok(())
    }

    pub fn insert_species(&self, species: &Species) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO species (id, genus_id, specific_epithet, authority, publication_year, conservation_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                species.id.to_string(),
                species.genus_id.to_string(),
                species.specific_epithet,
                species.authority,
                species.publication_year,
                species.conservation_status,
            ],
        )?;
        Ok(())
    }

    /// Remove the record and retire its id. Returns false when no live
    /// record of `rank` has this id.
    pub fn delete(&self, rank: Rank, id: Uuid) -> Result<bool> {
        let key = id.to_string();
        let sql = format!("DELETE FROM {} WHERE id = ?1", rank.table());
        if self.conn.execute(&sql, [&key])? == 0 {
            return Ok(false);
        }
        self.conn.execute(
            "INSERT INTO retired_ids (id, rank, retired_at) VALUES (?1, ?2, ?3)",
            params![key, rank.as_str(), chrono::Utc::now().timestamp()],
        )?;
        Ok(true)
    }

    // ========== Family Reads ==========

    pub fn get_family(&self, id: Uuid) -> Result<Option<Family>> {
        let sql = format!("SELECT {} FROM families WHERE id = ?1", FAMILY_COLUMNS);
        self.conn
            .query_row(&sql, [id.to_string()], row_to_family)
            .optional()
            .map_err(Into::into)
    }

    /// Families whose name contains `pattern` (case-sensitive), oldest first.
    /// An empty pattern lists every family.
    pub fn find_families_by_name(&self, pattern: &str) -> Result<Vec<Family>> {
        let sql = format!(
            "SELECT {} FROM families WHERE ?1 = '' OR instr(name, ?1) > 0 ORDER BY seq",
            FAMILY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let families = stmt
            .query_map([pattern], row_to_family)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(families)
    }

    // ========== Genus Reads ==========

    pub fn get_genus(&self, id: Uuid) -> Result<Option<Genus>> {
        let sql = format!("SELECT {} FROM genera WHERE id = ?1", GENUS_COLUMNS);
        self.conn
            .query_row(&sql, [id.to_string()], row_to_genus)
            .optional()
            .map_err(Into::into)
    }

    pub fn find_genera_by_name(&self, pattern: &str) -> Result<Vec<Genus>> {
        let sql = format!(
            "SELECT {} FROM genera WHERE ?1 = '' OR instr(name, ?1) > 0 ORDER BY seq",
            GENUS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let genera = stmt
            .query_map([pattern], row_to_genus)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(genera)
    }

    pub fn find_genera_in_family(&self, family_id: Uuid) -> Result<Vec<Genus>> {
        let sql = format!("SELECT {} FROM genera WHERE family_id = ?1 ORDER BY seq", GENUS_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let genera = stmt
            .query_map([family_id.to_string()], row_to_genus)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(genera)
    }

    // ========== Species Reads ==========

    pub fn get_species(&self, id: Uuid) -> Result<Option<Species>> {
        let sql = format!("SELECT {} FROM species WHERE id = ?1", SPECIES_COLUMNS);
        self.conn
            .query_row(&sql, [id.to_string()], row_to_species)
            .optional()
            .map_err(Into::into)
    }

    pub fn find_species_by_epithet(&self, pattern: &str) -> Result<Vec<Species>> {
        let sql = format!(
            "SELECT {} FROM species WHERE ?1 = '' OR instr(specific_epithet, ?1) > 0 ORDER BY seq",
            SPECIES_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let species = stmt
            .query_map([pattern], row_to_species)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(species)
    }

    pub fn find_species_in_genus(&self, genus_id: Uuid) -> Result<Vec<Species>> {
        let sql = format!("SELECT {} FROM species WHERE genus_id = ?1 ORDER BY seq", SPECIES_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let species = stmt
            .query_map([genus_id.to_string()], row_to_species)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(species)
    }

    /// Resolve a species and its ancestors. A broken parent link is
    /// reported as a backend error rather than papered over.
    pub fn lineage(&self, species_id: Uuid) -> Result<Option<Lineage>> {
        let Some(species) = self.get_species(species_id)? else {
            return Ok(None);
        };
        let genus = self.get_genus(species.genus_id)?.ok_or_else(|| dangling(Rank::Genus, species.genus_id))?;
        let family = self.get_family(genus.family_id)?.ok_or_else(|| dangling(Rank::Family, genus.family_id))?;
        Ok(Some(Lineage { family, genus, species }))
    }

    // ========== Statistics ==========

    pub fn count(&self, rank: Rank) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", rank.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_retired(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM retired_ids", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            schema_version: migrate::schema_version(self.conn)?,
            families: self.count(Rank::Family)?,
            genera: self.count(Rank::Genus)?,
            species: self.count(Rank::Species)?,
            retired_ids: self.count_retired()?,
        })
    }
}

fn dangling(rank: Rank, id: Uuid) -> Error {
    tracing::warn!("Lineage lookup found no live {} {}", rank, id);
    Error::Backend(rusqlite::Error::QueryReturnedNoRows)
}

fn parse_uuid(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_family(row: &rusqlite::Row) -> rusqlite::Result<Family> {
    Ok(Family {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        authority: row.get(2)?,
    })
}

fn row_to_genus(row: &rusqlite::Row) -> rusqlite::Result<Genus> {
    Ok(Genus {
        id: parse_uuid(row, 0)?,
        family_id: parse_uuid(row, 1)?,
        name: row.get(2)?,
        authority: row.get(3)?,
    })
}

fn row_to_species(row: &rusqlite::Row) -> rusqlite::Result<Species> {
    Ok(Species {
        id: parse_uuid(row, 0)?,
        genus_id: parse_uuid(row, 1)?,
        specific_epithet: row.get(2)?,
        authority: row.get(3)?,
        publication_year: row.get(4)?,
        conservation_status: row.get(5)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub schema_version: Option<i64>,
    pub families: usize,
    pub genera: usize,
    pub species: usize,
    pub retired_ids: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        match self.schema_version {
            Some(v) => writeln!(f, "  Schema version: {}", v)?,
            None => writeln!(f, "  Schema version: (unmigrated)")?,
        }
        writeln!(f, "  Families: {}", self.families)?;
        writeln!(f, "  Genera: {}", self.genera)?;
        writeln!(f, "  Species: {}", self.species)?;
        writeln!(f, "  Retired ids: {}", self.retired_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate::run_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_family_crud() {
        let conn = migrated();
        let store = SqliteStore::new(&conn);

        let family = Family::new("Rosaceae", "Juss.");
        store.insert_family(&family).unwrap();

        assert_eq!(store.get_family(family.id).unwrap(), Some(family.clone()));
        assert_eq!(store.id_use(family.id).unwrap(), Some(IdUse::Live(Rank::Family)));

        assert!(store.delete(Rank::Family, family.id).unwrap());
        assert!(!store.delete(Rank::Family, family.id).unwrap());
        assert_eq!(store.get_family(family.id).unwrap(), None);
        assert_eq!(store.id_use(family.id).unwrap(), Some(IdUse::Retired(Rank::Family)));
    }

    #[test]
    fn test_substring_search_is_literal_and_case_sensitive() {
        let conn = migrated();
        let store = SqliteStore::new(&conn);
        for name in ["Rosaceae", "Poaceae", "Orchid_aceae"] {
            store.insert_family(&Family::new(name, "")).unwrap();
        }

        let names = |pattern: &str| -> Vec<String> {
            store.find_families_by_name(pattern).unwrap().into_iter().map(|f| f.name).collect()
        };
        assert_eq!(names("aceae"), vec!["Rosaceae", "Poaceae", "Orchid_aceae"]);
        assert_eq!(names("rosaceae"), Vec::<String>::new());
        assert_eq!(names("%"), Vec::<String>::new());
        assert_eq!(names("_"), vec!["Orchid_aceae"]);
        assert_eq!(names("").len(), 3);
    }

    #[test]
    fn test_children_counts() {
        let conn = migrated();
        let store = SqliteStore::new(&conn);
        let family = Family::new("Rosaceae", "Juss.");
        let genus = Genus::new(family.id, "Rosa", "L.");
        store.insert_family(&family).unwrap();
        store.insert_genus(&genus).unwrap();
        store.insert_species(&Species::new(genus.id, "canina", "L.", Some(1753), None)).unwrap();
        store.insert_species(&Species::new(genus.id, "gallica", "L.", Some(1753), None)).unwrap();

        assert_eq!(store.count_children(Rank::Family, family.id).unwrap(), 1);
        assert_eq!(store.count_children(Rank::Genus, genus.id).unwrap(), 2);
        assert_eq!(store.count_children(Rank::Species, genus.id).unwrap(), 0);
    }

    #[test]
    fn test_malformed_id_is_backend_error() {
        let conn = migrated();
        conn.execute("INSERT INTO families (id, name, authority) VALUES ('not-a-uuid', 'Broken', '')", [])
            .unwrap();
        let store = SqliteStore::new(&conn);
        assert!(matches!(store.find_families_by_name(""), Err(Error::Backend(_))));
    }

    #[test]
    fn test_stats_display() {
        let conn = migrated();
        let store = SqliteStore::new(&conn);
        store.insert_family(&Family::new("Rosaceae", "Juss.")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.families, 1);
        assert_eq!(stats.schema_version, Some(super::super::schema::SCHEMA_VERSION));
        assert!(stats.to_string().contains("Families: 1"));
    }
}
