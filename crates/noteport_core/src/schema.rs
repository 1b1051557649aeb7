//! Runtime discovery of the source database's internal entity identifiers.
//!
//! # Responsibility
//! - Map logical concepts (note, folder, attachment, media, account) to the
//!   numeric `Z_ENT` values valid in the current database instance.
//! - Fall back to last-known-good constants when discovery misses.
//!
//! # Invariants
//! - The map is built once per run and immutable afterwards.
//! - A single missing concept never fails the run; only a required concept
//!   with no identifier at all is fatal.

use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Folder type marking the deleted-items container.
pub const FOLDER_TYPE_TRASH: i64 = 1;
/// Folder type marking smart folders (dynamic queries, not containers).
pub const FOLDER_TYPE_SMART: i64 = 3;

/// Logical concepts whose numeric identifiers drift across schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Note,
    Folder,
    Attachment,
    Media,
    Account,
}

impl EntityKind {
    /// Symbolic name used in the metadata table lookup.
    pub fn symbolic_name(self) -> &'static str {
        match self {
            Self::Note => "ICNote",
            Self::Folder => "ICFolder",
            Self::Attachment => "ICAttachment",
            Self::Media => "ICMedia",
            Self::Account => "ICAccount",
        }
    }

    /// Last-known-good identifier for recent schema versions.
    fn fallback_id(self) -> i64 {
        match self {
            Self::Note => 10,
            Self::Folder => 5,
            Self::Attachment => 7,
            Self::Media => 8,
            Self::Account => 1,
        }
    }

    /// Concepts without which no record can be interpreted at all.
    fn is_required(self) -> bool {
        matches!(self, Self::Note | Self::Attachment)
    }

    const ALL: [EntityKind; 5] = [
        Self::Note,
        Self::Folder,
        Self::Attachment,
        Self::Media,
        Self::Account,
    ];
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbolic_name())
    }
}

#[derive(Debug)]
pub enum SchemaError {
    /// A required concept has no discovered identifier and no fallback.
    FatalMiss(EntityKind),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FatalMiss(kind) => write!(
                f,
                "required entity identifier `{kind}` could not be resolved; \
                 no record can be interpreted without it"
            ),
        }
    }
}

impl Error for SchemaError {}

/// Immutable concept-to-identifier map for one run.
#[derive(Debug, Clone)]
pub struct EntityIdMap {
    ids: BTreeMap<EntityKind, i64>,
    discovered: BTreeMap<EntityKind, bool>,
}

impl EntityIdMap {
    /// Builds the map from the metadata table, with per-concept fallback.
    ///
    /// Queries `Z_PRIMARYKEY` for each symbolic name. A failed query or a
    /// missing row substitutes the fallback constant and logs a warning;
    /// neither case fails the run.
    pub fn resolve(conn: &Connection) -> Self {
        let mut ids = BTreeMap::new();
        let mut discovered = BTreeMap::new();

        let looked_up = lookup_all(conn);
        for kind in EntityKind::ALL {
            match looked_up.as_ref().ok().and_then(|m| m.get(&kind).copied()) {
                Some(ent) => {
                    info!(
                        "event=schema_resolve module=schema status=ok concept={} ent={ent}",
                        kind
                    );
                    ids.insert(kind, ent);
                    discovered.insert(kind, true);
                }
                None => {
                    let fallback = kind.fallback_id();
                    warn!(
                        "event=schema_resolve module=schema status=fallback concept={} ent={fallback}",
                        kind
                    );
                    ids.insert(kind, fallback);
                    discovered.insert(kind, false);
                }
            }
        }

        Self { ids, discovered }
    }

    /// Constructs a map from explicit identifiers (tests, fixtures).
    pub fn from_pairs(pairs: &[(EntityKind, i64)]) -> Self {
        let mut ids = BTreeMap::new();
        let mut discovered = BTreeMap::new();
        for (kind, ent) in pairs {
            ids.insert(*kind, *ent);
            discovered.insert(*kind, true);
        }
        Self { ids, discovered }
    }

    /// Identifier for a concept, when known.
    pub fn get(&self, kind: EntityKind) -> Option<i64> {
        self.ids.get(&kind).copied()
    }

    /// Identifier for a concept that the run cannot proceed without.
    ///
    /// # Errors
    /// - `SchemaError::FatalMiss` when the concept is required and absent.
    pub fn required(&self, kind: EntityKind) -> Result<i64, SchemaError> {
        debug_assert!(kind.is_required(), "only Note/Attachment are required");
        self.get(kind).ok_or(SchemaError::FatalMiss(kind))
    }

    /// Whether the identifier came from live discovery rather than fallback.
    pub fn was_discovered(&self, kind: EntityKind) -> bool {
        self.discovered.get(&kind).copied().unwrap_or(false)
    }
}

fn lookup_all(conn: &Connection) -> rusqlite::Result<BTreeMap<EntityKind, i64>> {
    let mut stmt = conn.prepare("SELECT Z_NAME, Z_ENT FROM Z_PRIMARYKEY")?;
    let mut rows = stmt.query([])?;
    let mut found = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let ent: i64 = row.get(1)?;
        for kind in EntityKind::ALL {
            if kind.symbolic_name() == name {
                found.insert(kind, ent);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::{EntityIdMap, EntityKind};
    use crate::db::open_db_in_memory;

    #[test]
    fn resolve_prefers_metadata_table_values() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Z_PRIMARYKEY (Z_NAME TEXT, Z_ENT INTEGER);
             INSERT INTO Z_PRIMARYKEY VALUES ('ICNote', 11), ('ICFolder', 14);",
        )
        .unwrap();

        let map = EntityIdMap::resolve(&conn);
        assert_eq!(map.get(EntityKind::Note), Some(11));
        assert!(map.was_discovered(EntityKind::Note));
        assert_eq!(map.get(EntityKind::Folder), Some(14));
        // Missing names fall back per concept without failing.
        assert_eq!(map.get(EntityKind::Attachment), Some(7));
        assert!(!map.was_discovered(EntityKind::Attachment));
    }

    #[test]
    fn resolve_survives_missing_metadata_table() {
        let conn = open_db_in_memory().unwrap();
        let map = EntityIdMap::resolve(&conn);
        assert_eq!(map.get(EntityKind::Note), Some(10));
        assert_eq!(map.get(EntityKind::Account), Some(1));
        assert!(!map.was_discovered(EntityKind::Note));
    }

    #[test]
    fn required_concepts_always_resolve_with_fallbacks_present() {
        let conn = open_db_in_memory().unwrap();
        let map = EntityIdMap::resolve(&conn);
        assert!(map.required(EntityKind::Note).is_ok());
        assert!(map.required(EntityKind::Attachment).is_ok());
    }
}
