//! Database schema definitions
//!
//! The layout is built by an ordered list of migrations. Each one names the
//! objects it creates so the migration engine can tell a complete layout from
//! a half-applied one.

/// Latest schema version this crate knows how to build
pub const SCHEMA_VERSION: i64 = 2;

/// Version marker table. Exactly one row once a store has been migrated.
pub const CREATE_STORE_META_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL)";

/// SQL to create the families table
///
/// `seq` records insertion order; `id` is the public identifier.
pub const CREATE_FAMILIES_TABLE: &str = r#"
CREATE TABLE families (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    authority TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the genera table
pub const CREATE_GENERA_TABLE: &str = r#"
CREATE TABLE genera (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    family_id TEXT NOT NULL REFERENCES families(id),
    name TEXT NOT NULL,
    authority TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the species table
pub const CREATE_SPECIES_TABLE: &str = r#"
CREATE TABLE species (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    genus_id TEXT NOT NULL REFERENCES genera(id),
    specific_epithet TEXT NOT NULL,
    authority TEXT NOT NULL DEFAULT '',
    publication_year INTEGER,
    conservation_status TEXT
)
"#;

/// Name index on families
pub const CREATE_FAMILIES_NAME_INDEX: &str = "CREATE INDEX idx_families_name ON families(name)";

/// Name and parent-id indexes on genera
pub const CREATE_GENERA_NAME_INDEX: &str = "CREATE INDEX idx_genera_name ON genera(name)";
pub const CREATE_GENERA_FAMILY_INDEX: &str = "CREATE INDEX idx_genera_family_id ON genera(family_id)";

/// Epithet and parent-id indexes on species
pub const CREATE_SPECIES_EPITHET_INDEX: &str =
    "CREATE INDEX idx_species_epithet ON species(specific_epithet)";
pub const CREATE_SPECIES_GENUS_INDEX: &str = "CREATE INDEX idx_species_genus_id ON species(genus_id)";

/// SQL to create the identifier tombstone table
/// Ids land here when their record is deleted and are never handed out again
pub const CREATE_RETIRED_IDS_TABLE: &str = r#"
CREATE TABLE retired_ids (
    id TEXT PRIMARY KEY,
    rank TEXT NOT NULL,
    retired_at INTEGER NOT NULL
)
"#;

/// Kind of a schema object as recorded in `sqlite_master.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
        }
    }
}

/// A table or index a migration is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: &'static str,
}

const fn table(name: &'static str) -> SchemaObject {
    SchemaObject { kind: ObjectKind::Table, name }
}

const fn index(name: &'static str) -> SchemaObject {
    SchemaObject { kind: ObjectKind::Index, name }
}

/// One step of the schema history
#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    /// Statements that build this step, in execution order
    pub statements: &'static [&'static str],
    pub objects: &'static [SchemaObject],
}

/// Every migration, oldest first. Versions are contiguous from 1.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "rank tables with name and parent-id indexes",
        statements: &[
            CREATE_FAMILIES_TABLE,
            CREATE_GENERA_TABLE,
            CREATE_SPECIES_TABLE,
            CREATE_FAMILIES_NAME_INDEX,
            CREATE_GENERA_NAME_INDEX,
            CREATE_GENERA_FAMILY_INDEX,
            CREATE_SPECIES_EPITHET_INDEX,
            CREATE_SPECIES_GENUS_INDEX,
        ],
        objects: &[
            table("families"),
            table("genera"),
            table("species"),
            index("idx_families_name"),
            index("idx_genera_name"),
            index("idx_genera_family_id"),
            index("idx_species_epithet"),
            index("idx_species_genus_id"),
        ],
    },
    Migration {
        version: 2,
        description: "retired identifier tombstones",
        statements: &[CREATE_RETIRED_IDS_TABLE],
        objects: &[table("retired_ids")],
    },
];

/// Objects that must exist in a store at `version`
pub fn objects_through(version: i64) -> impl Iterator<Item = &'static SchemaObject> {
    MIGRATIONS
        .iter()
        .filter(move |m| m.version <= version)
        .flat_map(|m| m.objects.iter())
}

/// Objects that must not exist yet in a store at `version`
pub fn objects_after(version: i64) -> impl Iterator<Item = &'static SchemaObject> {
    MIGRATIONS
        .iter()
        .filter(move |m| m.version > version)
        .flat_map(|m| m.objects.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_contiguous() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i64 + 1);
            // One CREATE per declared object
            assert_eq!(migration.statements.len(), migration.objects.len());
        }
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_object_partition() {
        let total: usize = MIGRATIONS.iter().map(|m| m.objects.len()).sum();
        for version in 0..=SCHEMA_VERSION {
            assert_eq!(objects_through(version).count() + objects_after(version).count(), total);
        }
        assert_eq!(objects_after(SCHEMA_VERSION).count(), 0);
    }

    #[test]
    fn test_statements_build_declared_objects() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for migration in MIGRATIONS {
            for stmt in migration.statements {
                conn.execute(stmt, []).unwrap();
            }
            for object in migration.objects {
                let found: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                        [object.kind.as_str(), object.name],
                        |row| row.get(0),
                    )
                    .unwrap();
                assert_eq!(found, 1, "{} was not created", object.name);
            }
        }
    }
}
