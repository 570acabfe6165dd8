//! SQLite storage backend for the concept graph

use super::traits::{
    ConceptRegistry, GraphStore, OpenStore, PurgeReport, StorageError, StorageResult,
};
use crate::graph::{
    ConceptId, ConceptRelationship, Laboratory, LaboratoryId, NewRelationship, NewTag,
    RelationshipId, Tag, TagArena, TagAssociation, TagId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits for another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RELATIONSHIP_COLUMNS: &str = "id, source_id, target_id, relationship_type, description, \
     strength, confidence, created_by, is_validated, is_bidirectional, access_count, is_active, \
     created_at, updated_at";

const TAG_COLUMNS: &str = "id, name, description, color, laboratory_id, parent_id, usage_count, \
     is_system_tag, is_active, created_at";

/// SQLite-backed concept graph store
///
/// Uses a single database file with tables for relationships, tags and tag
/// associations, plus laboratory and concept tables so the store can act as
/// its own `ConceptRegistry`. Thread-safe via an internal mutex on the
/// connection; writes that read before they write run in IMMEDIATE
/// transactions so that separate connections on the same file serialize.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps, so text order matches time order
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

/// Raw column values of a `concept_relationships` row
struct RelationshipRow {
    id: i64,
    source_id: String,
    target_id: String,
    relationship_type: String,
    description: Option<String>,
    strength: f64,
    confidence: f64,
    created_by: String,
    is_validated: bool,
    is_bidirectional: bool,
    access_count: i64,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl RelationshipRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            target_id: row.get(2)?,
            relationship_type: row.get(3)?,
            description: row.get(4)?,
            strength: row.get(5)?,
            confidence: row.get(6)?,
            created_by: row.get(7)?,
            is_validated: row.get(8)?,
            is_bidirectional: row.get(9)?,
            access_count: row.get(10)?,
            is_active: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_relationship(self) -> StorageResult<ConceptRelationship> {
        Ok(ConceptRelationship {
            id: RelationshipId::from_raw(self.id),
            source: ConceptId::from(self.source_id),
            target: ConceptId::from(self.target_id),
            relationship_type: self.relationship_type.parse().map_err(StorageError::Corrupt)?,
            description: self.description,
            strength: self.strength as f32,
            confidence: self.confidence as f32,
            created_by: self.created_by.parse().map_err(StorageError::Corrupt)?,
            is_validated: self.is_validated,
            is_bidirectional: self.is_bidirectional,
            access_count: self.access_count.max(0) as u64,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Raw column values of a `tags` row
struct TagRow {
    id: i64,
    name: String,
    description: Option<String>,
    color: String,
    laboratory_id: Option<String>,
    parent_id: Option<i64>,
    usage_count: i64,
    is_system_tag: bool,
    is_active: bool,
    created_at: String,
}

impl TagRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            color: row.get(3)?,
            laboratory_id: row.get(4)?,
            parent_id: row.get(5)?,
            usage_count: row.get(6)?,
            is_system_tag: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_tag(self) -> StorageResult<Tag> {
        Ok(Tag {
            id: TagId::from_raw(self.id),
            name: self.name,
            description: self.description,
            color: self.color,
            laboratory_id: self.laboratory_id.map(LaboratoryId::from),
            parent_id: self.parent_id.map(TagId::from_raw),
            usage_count: self.usage_count.max(0) as u64,
            is_system_tag: self.is_system_tag,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn query_relationships(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StorageResult<Vec<ConceptRelationship>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, RelationshipRow::read)?;

    let mut relationships = Vec::new();
    for row in rows {
        relationships.push(row?.into_relationship()?);
    }
    Ok(relationships)
}

fn read_tag_arena(conn: &Connection) -> StorageResult<TagArena> {
    let mut stmt = conn.prepare("SELECT id, name, parent_id FROM tags")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<i64>>(2)?,
        ))
    })?;

    let mut arena = TagArena::new();
    for row in rows {
        let (id, name, parent) = row?;
        arena.insert(TagId::from_raw(id), name, parent.map(TagId::from_raw));
    }
    Ok(arena)
}

fn tag_exists(conn: &Connection, id: TagId) -> StorageResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        params![id.as_i64()],
        |row| row.get(0),
    )?)
}

/// Decrement usage of every tag on the concept, then drop the associations
fn remove_concept_tags(conn: &Connection, concept: &ConceptId) -> StorageResult<usize> {
    conn.execute(
        "UPDATE tags SET usage_count = MAX(usage_count - 1, 0)
         WHERE id IN (SELECT tag_id FROM concept_tags WHERE concept_id = ?1)",
        params![concept.as_str()],
    )?;
    Ok(conn.execute(
        "DELETE FROM concept_tags WHERE concept_id = ?1",
        params![concept.as_str()],
    )?)
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            -- Laboratory and concept records (registry role)
            CREATE TABLE IF NOT EXISTS laboratories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS concepts (
                id TEXT PRIMARY KEY,
                laboratory_id TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (laboratory_id) REFERENCES laboratories(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_concepts_laboratory
                ON concepts(laboratory_id);

            -- Directed relationships; one row per (source, target, type)
            CREATE TABLE IF NOT EXISTS concept_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                description TEXT,
                strength REAL NOT NULL,
                confidence REAL NOT NULL,
                created_by TEXT NOT NULL,
                is_validated INTEGER NOT NULL DEFAULT 0,
                is_bidirectional INTEGER NOT NULL DEFAULT 1,
                access_count INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (source_id <> target_id),
                UNIQUE (source_id, target_id, relationship_type)
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_source
                ON concept_relationships(source_id);
            CREATE INDEX IF NOT EXISTS idx_relationships_target
                ON concept_relationships(target_id);

            -- Tag forest
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                color TEXT NOT NULL,
                laboratory_id TEXT,
                parent_id INTEGER,
                usage_count INTEGER NOT NULL DEFAULT 0,
                is_system_tag INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                FOREIGN KEY (parent_id) REFERENCES tags(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tags_laboratory
                ON tags(laboratory_id);

            -- One name per scope; global tags share the '' scope
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_scope_name
                ON tags(COALESCE(laboratory_id, ''), name);

            CREATE TABLE IF NOT EXISTS concept_tags (
                concept_id TEXT NOT NULL,
                tag_id INTEGER NOT NULL,
                confidence REAL NOT NULL,
                assigned_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (concept_id, tag_id),
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_concept_tags_tag
                ON concept_tags(tag_id);

            PRAGMA foreign_keys = ON;

            -- Concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // === Registry records ===

    /// Create or update a laboratory record
    pub fn save_laboratory(&self, laboratory: &Laboratory) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO laboratories (id, name, description, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description
            "#,
            params![
                laboratory.id.as_str(),
                laboratory.name,
                laboratory.description,
                timestamp(laboratory.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn load_laboratory(&self, id: &LaboratoryId) -> StorageResult<Option<Laboratory>> {
        let conn = self.conn()?;
        let row: Option<(String, Option<String>, String)> = conn
            .query_row(
                "SELECT name, description, created_at FROM laboratories WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((name, description, created_at)) => Ok(Some(Laboratory {
                id: id.clone(),
                name,
                description,
                created_at: parse_timestamp(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    pub fn list_laboratories(&self) -> StorageResult<Vec<Laboratory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at FROM laboratories ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut labs = Vec::new();
        for row in rows {
            let (id, name, description, created_at) = row?;
            labs.push(Laboratory {
                id: LaboratoryId::from(id),
                name,
                description,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(labs)
    }

    /// Delete a laboratory record; its concept records go with it
    pub fn delete_laboratory(&self, id: &LaboratoryId) -> StorageResult<bool> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM concepts WHERE laboratory_id = ?1",
            params![id.as_str()],
        )?;
        let rows = conn.execute("DELETE FROM laboratories WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    /// Record a concept inside an existing laboratory
    pub fn register_concept(
        &self,
        id: &ConceptId,
        laboratory: &LaboratoryId,
        title: Option<&str>,
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let lab_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM laboratories WHERE id = ?1)",
            params![laboratory.as_str()],
            |row| row.get(0),
        )?;
        if !lab_exists {
            return Err(StorageError::LaboratoryNotFound(laboratory.to_string()));
        }

        let concept_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM concepts WHERE id = ?1)",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if concept_exists {
            return Err(StorageError::Conflict(format!("concept {}", id)));
        }

        tx.execute(
            "INSERT INTO concepts (id, laboratory_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.as_str(), laboratory.as_str(), title, timestamp(Utc::now())],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Forget a concept record. Graph references are left to `purge_concept`.
    pub fn remove_concept(&self, id: &ConceptId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM concepts WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ConceptRegistry for SqliteStore {
    fn concept_exists(&self, id: &ConceptId) -> StorageResult<bool> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM concepts WHERE id = ?1)",
            params![id.as_str()],
            |row| row.get(0),
        )?)
    }

    fn concept_laboratory(&self, id: &ConceptId) -> StorageResult<Option<LaboratoryId>> {
        let conn = self.conn()?;
        let lab: Option<String> = conn
            .query_row(
                "SELECT laboratory_id FROM concepts WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(lab.map(LaboratoryId::from))
    }

    fn concepts_in(&self, laboratory: &LaboratoryId) -> StorageResult<Vec<ConceptId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM concepts WHERE laboratory_id = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![laboratory.as_str()], |row| row.get::<_, String>(0))?
            .map(|r| r.map(ConceptId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn drop_laboratory(&self, laboratory: &LaboratoryId) -> StorageResult<bool> {
        self.delete_laboratory(laboratory)
    }
}

impl GraphStore for SqliteStore {
    // === Relationship Operations ===

    fn upsert_relationship(&self, relationship: &NewRelationship) -> StorageResult<RelationshipId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = timestamp(Utc::now());

        // The UNIQUE triple makes this a single atomic insert-or-update; a
        // re-asserted edge is reactivated and keeps its original creator.
        let id: i64 = tx.query_row(
            r#"
            INSERT INTO concept_relationships (source_id, target_id, relationship_type, description,
                                               strength, confidence, created_by, is_bidirectional,
                                               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(source_id, target_id, relationship_type) DO UPDATE SET
                strength = excluded.strength,
                confidence = excluded.confidence,
                is_bidirectional = excluded.is_bidirectional,
                description = COALESCE(excluded.description, concept_relationships.description),
                is_active = 1,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            params![
                relationship.source.as_str(),
                relationship.target.as_str(),
                relationship.relationship_type.as_str(),
                relationship.description,
                relationship.strength as f64,
                relationship.confidence as f64,
                relationship.created_by.as_str(),
                relationship.is_bidirectional,
                now,
            ],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(RelationshipId::from_raw(id))
    }

    fn load_relationship(&self, id: RelationshipId) -> StorageResult<Option<ConceptRelationship>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM concept_relationships WHERE id = ?1", RELATIONSHIP_COLUMNS),
                params![id.as_i64()],
                RelationshipRow::read,
            )
            .optional()?;

        row.map(RelationshipRow::into_relationship).transpose()
    }

    fn set_relationship_active(&self, id: RelationshipId, active: bool) -> StorageResult<Option<bool>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE concept_relationships SET is_active = ?2, updated_at = ?3
             WHERE id = ?1 AND is_active <> ?2",
            params![id.as_i64(), active, timestamp(Utc::now())],
        )?;
        if changed > 0 {
            return Ok(Some(true));
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM concept_relationships WHERE id = ?1)",
            params![id.as_i64()],
            |row| row.get(0),
        )?;
        Ok(exists.then_some(false))
    }

    fn set_relationship_validated(&self, id: RelationshipId, validated: bool) -> StorageResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE concept_relationships SET is_validated = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.as_i64(), validated, timestamp(Utc::now())],
        )?;
        Ok(rows > 0)
    }

    fn relationships_touching(
        &self,
        concept: &ConceptId,
        include_inactive: bool,
    ) -> StorageResult<Vec<ConceptRelationship>> {
        let conn = self.conn()?;
        query_relationships(
            &conn,
            &format!(
                "SELECT {} FROM concept_relationships
                 WHERE (source_id = ?1 OR target_id = ?1) AND (?2 OR is_active = 1)
                 ORDER BY created_at ASC, id ASC",
                RELATIONSHIP_COLUMNS
            ),
            params![concept.as_str(), include_inactive],
        )
    }

    fn relationships_into(
        &self,
        concept: &ConceptId,
        include_inactive: bool,
    ) -> StorageResult<Vec<ConceptRelationship>> {
        let conn = self.conn()?;
        query_relationships(
            &conn,
            &format!(
                "SELECT {} FROM concept_relationships
                 WHERE target_id = ?1 AND (?2 OR is_active = 1)
                 ORDER BY created_at ASC, id ASC",
                RELATIONSHIP_COLUMNS
            ),
            params![concept.as_str(), include_inactive],
        )
    }

    fn active_relationships(&self) -> StorageResult<Vec<ConceptRelationship>> {
        let conn = self.conn()?;
        query_relationships(
            &conn,
            &format!(
                "SELECT {} FROM concept_relationships WHERE is_active = 1
                 ORDER BY created_at ASC, id ASC",
                RELATIONSHIP_COLUMNS
            ),
            [],
        )
    }

    fn increment_access(&self, ids: &[RelationshipId]) -> StorageResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE concept_relationships SET access_count = access_count + 1 WHERE id = ?1",
            )?;
            for id in ids {
                updated += stmt.execute(params![id.as_i64()])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    // === Tag Operations ===

    fn insert_tag(&self, tag: &NewTag) -> StorageResult<TagId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(parent) = tag.parent_id {
            if !tag_exists(&tx, parent)? {
                return Err(StorageError::TagNotFound(parent));
            }
        }

        let name = tag.name.trim();
        let scope = tag.laboratory_id.as_ref().map(|l| l.as_str());
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tags WHERE COALESCE(laboratory_id, '') = COALESCE(?1, '') AND name = ?2)",
            params![scope, name],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StorageError::Conflict(format!("tag name {}", name)));
        }

        tx.execute(
            r#"
            INSERT INTO tags (name, description, color, laboratory_id, parent_id, is_system_tag, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                name,
                tag.description,
                tag.color,
                scope,
                tag.parent_id.map(|p| p.as_i64()),
                tag.is_system_tag,
                timestamp(Utc::now()),
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(TagId::from_raw(id))
    }

    fn load_tag(&self, id: TagId) -> StorageResult<Option<Tag>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM tags WHERE id = ?1", TAG_COLUMNS),
                params![id.as_i64()],
                TagRow::read,
            )
            .optional()?;

        row.map(TagRow::into_tag).transpose()
    }

    fn list_tags(&self, laboratory: Option<&LaboratoryId>) -> StorageResult<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tags
             WHERE is_active = 1 AND (?1 IS NULL OR laboratory_id IS NULL OR laboratory_id = ?1)
             ORDER BY name, id",
            TAG_COLUMNS
        ))?;
        let rows = stmt.query_map(params![laboratory.map(|l| l.as_str())], TagRow::read)?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?.into_tag()?);
        }
        Ok(tags)
    }

    fn set_tag_active(&self, id: TagId, active: bool) -> StorageResult<Option<bool>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tags SET is_active = ?2 WHERE id = ?1 AND is_active <> ?2",
            params![id.as_i64(), active],
        )?;
        if changed > 0 {
            return Ok(Some(true));
        }
        Ok(tag_exists(&conn, id)?.then_some(false))
    }

    fn load_tag_arena(&self) -> StorageResult<TagArena> {
        let conn = self.conn()?;
        read_tag_arena(&conn)
    }

    fn set_tag_parent(&self, tag: TagId, parent: Option<TagId>) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Check against the hierarchy as it stands inside this transaction
        read_tag_arena(&tx)?.check_parent(tag, parent)?;

        tx.execute(
            "UPDATE tags SET parent_id = ?2 WHERE id = ?1",
            params![tag.as_i64(), parent.map(|p| p.as_i64())],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_tag_association(&self, association: &TagAssociation) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !tag_exists(&tx, association.tag_id)? {
            return Err(StorageError::TagNotFound(association.tag_id));
        }

        let existed: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM concept_tags WHERE concept_id = ?1 AND tag_id = ?2)",
            params![association.concept_id.as_str(), association.tag_id.as_i64()],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"
            INSERT INTO concept_tags (concept_id, tag_id, confidence, assigned_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(concept_id, tag_id) DO UPDATE SET
                confidence = excluded.confidence,
                assigned_by = excluded.assigned_by
            "#,
            params![
                association.concept_id.as_str(),
                association.tag_id.as_i64(),
                association.confidence as f64,
                association.assigned_by.as_str(),
                timestamp(association.created_at),
            ],
        )?;

        if !existed {
            tx.execute(
                "UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?1",
                params![association.tag_id.as_i64()],
            )?;
        }

        tx.commit()?;
        Ok(!existed)
    }

    fn delete_tag_association(&self, concept: &ConceptId, tag: TagId) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let deleted = tx.execute(
            "DELETE FROM concept_tags WHERE concept_id = ?1 AND tag_id = ?2",
            params![concept.as_str(), tag.as_i64()],
        )?;
        if deleted > 0 {
            tx.execute(
                "UPDATE tags SET usage_count = MAX(usage_count - 1, 0) WHERE id = ?1",
                params![tag.as_i64()],
            )?;
        }

        tx.commit()?;
        Ok(deleted > 0)
    }

    fn tag_associations_for(&self, concept: &ConceptId) -> StorageResult<Vec<TagAssociation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT tag_id, confidence, assigned_by, created_at FROM concept_tags
             WHERE concept_id = ?1 ORDER BY created_at, tag_id",
        )?;
        let rows = stmt.query_map(params![concept.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut associations = Vec::new();
        for row in rows {
            let (tag_id, confidence, assigned_by, created_at) = row?;
            associations.push(TagAssociation {
                concept_id: concept.clone(),
                tag_id: TagId::from_raw(tag_id),
                confidence: confidence as f32,
                assigned_by: assigned_by.parse().map_err(StorageError::Corrupt)?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(associations)
    }

    fn concepts_tagged(&self, tag: TagId) -> StorageResult<Vec<ConceptId>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT concept_id FROM concept_tags WHERE tag_id = ?1 ORDER BY concept_id")?;
        let ids = stmt
            .query_map(params![tag.as_i64()], |row| row.get::<_, String>(0))?
            .map(|r| r.map(ConceptId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // === Cascades ===

    fn purge_concept(&self, concept: &ConceptId) -> StorageResult<PurgeReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let relationships = tx.execute(
            "UPDATE concept_relationships SET is_active = 0, updated_at = ?2
             WHERE (source_id = ?1 OR target_id = ?1) AND is_active = 1",
            params![concept.as_str(), timestamp(Utc::now())],
        )?;
        let tag_associations = remove_concept_tags(&tx, concept)?;

        tx.commit()?;
        Ok(PurgeReport {
            relationships,
            tag_associations,
            tags: 0,
        })
    }

    fn erase_laboratory(&self, laboratory: &LaboratoryId, concepts: &[ConceptId]) -> StorageResult<PurgeReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut report = PurgeReport::default();
        for concept in concepts {
            report.relationships += tx.execute(
                "DELETE FROM concept_relationships WHERE source_id = ?1 OR target_id = ?1",
                params![concept.as_str()],
            )?;
            report.tag_associations += remove_concept_tags(&tx, concept)?;
        }

        // Children in other scopes become roots
        tx.execute(
            "UPDATE tags SET parent_id = NULL
             WHERE parent_id IN (SELECT id FROM tags WHERE laboratory_id = ?1)",
            params![laboratory.as_str()],
        )?;
        report.tag_associations += tx.execute(
            "DELETE FROM concept_tags WHERE tag_id IN (SELECT id FROM tags WHERE laboratory_id = ?1)",
            params![laboratory.as_str()],
        )?;
        report.tags = tx.execute(
            "DELETE FROM tags WHERE laboratory_id = ?1",
            params![laboratory.as_str()],
        )?;

        tx.commit()?;
        Ok(report)
    }
}
