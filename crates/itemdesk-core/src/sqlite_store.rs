use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

use crate::record::{
    Approval, Category, ItemFields, ItemRecord, Priority, RecordId, Status, Value,
};
use crate::store::{now_millis, refreshed, RecordStore, StoreError};

const COLUMNS: &str = "id, name, description, category, priority, status, assignee, created_by,
    due_date, tags, custom_fields, metadata, estimated_hours, budget, location, external_refs,
    workflow_stage, approval_required, template_id, parent_id, attachment_ids, reminder_settings,
    approved_by, approved_at, created, modified";

const EDGE_DEPENDS_ON: &str = "depends_on";
const EDGE_LINKS_TO: &str = "links_to";

/// SQLite-backed implementation of the RecordStore trait.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

fn storage<E: Display>(context: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::Storage(format!("{}: {}", context, e))
}

impl SqliteRecordStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(storage("open"))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(storage("open_in_memory"))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        // parent_id and target_id carry no foreign key: references to deleted
        // records are allowed to dangle.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                category TEXT,
                priority TEXT NOT NULL DEFAULT 'medium',
                status TEXT NOT NULL DEFAULT 'active',
                assignee TEXT,
                created_by TEXT,
                due_date TEXT,
                tags TEXT NOT NULL,
                custom_fields TEXT NOT NULL,
                metadata TEXT NOT NULL,
                estimated_hours REAL,
                budget REAL,
                location TEXT,
                external_refs TEXT NOT NULL,
                workflow_stage TEXT,
                approval_required INTEGER NOT NULL DEFAULT 0,
                template_id TEXT,
                parent_id TEXT,
                attachment_ids TEXT NOT NULL,
                reminder_settings TEXT,
                approved_by TEXT,
                approved_at INTEGER,
                created INTEGER NOT NULL,
                modified INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS record_edges (
                source_id TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                target_id TEXT NOT NULL,
                edge_kind TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (source_id, edge_kind, position)
            );

            CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent_id);
            CREATE INDEX IF NOT EXISTS idx_records_created ON records(created);
            CREATE INDEX IF NOT EXISTS idx_record_edges_target ON record_edges(target_id, edge_kind);
            ",
        )
        .map_err(storage("init_schema"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn write_fields(
        tx: &Transaction<'_>,
        id: RecordId,
        fields: &ItemFields,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let id_str = id.to_string();
        let (approved_by, approved_at) = match &fields.approval {
            Some(a) => (Some(a.approver.clone()), Some(a.approved_at.timestamp_millis())),
            None => (None, None),
        };
        let reminder_settings = fields
            .reminder_settings
            .as_ref()
            .map(to_json)
            .transpose()?;

        tx.execute(
            "INSERT INTO records (id, name, description, category, priority, status,
                assignee, created_by, due_date, tags, custom_fields, metadata, estimated_hours,
                budget, location, external_refs, workflow_stage, approval_required, template_id,
                parent_id, attachment_ids, reminder_settings, approved_by, approved_at, created,
                modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                description = excluded.description, category = excluded.category,
                priority = excluded.priority, status = excluded.status,
                assignee = excluded.assignee, created_by = excluded.created_by,
                due_date = excluded.due_date, tags = excluded.tags,
                custom_fields = excluded.custom_fields, metadata = excluded.metadata,
                estimated_hours = excluded.estimated_hours, budget = excluded.budget,
                location = excluded.location, external_refs = excluded.external_refs,
                workflow_stage = excluded.workflow_stage,
                approval_required = excluded.approval_required,
                template_id = excluded.template_id, parent_id = excluded.parent_id,
                attachment_ids = excluded.attachment_ids,
                reminder_settings = excluded.reminder_settings,
                approved_by = excluded.approved_by, approved_at = excluded.approved_at,
                modified = excluded.modified",
            params![
                id_str,
                fields.name,
                fields.description,
                fields.category.map(|c| c.as_str()),
                fields.priority.as_str(),
                fields.status.as_str(),
                fields.assignee,
                fields.created_by,
                fields.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                to_json(&fields.tags)?,
                to_json(&fields.custom_fields)?,
                to_json(&fields.metadata)?,
                fields.estimated_hours,
                fields.budget,
                fields.location,
                to_json(&fields.external_refs)?,
                fields.workflow_stage,
                fields.approval_required,
                fields.template_id,
                fields.parent_item_id.map(|p| p.to_string()),
                to_json(&fields.attachment_ids)?,
                reminder_settings,
                approved_by,
                approved_at,
                created.timestamp_millis(),
                modified.timestamp_millis(),
            ],
        )
        .map_err(storage("write record"))?;

        tx.execute(
            "DELETE FROM record_edges WHERE source_id = ?1",
            params![&id_str],
        )
        .map_err(storage("clear edges"))?;
        for (kind, targets) in [
            (EDGE_DEPENDS_ON, &fields.dependencies),
            (EDGE_LINKS_TO, &fields.linked_items),
        ] {
            for (position, target) in targets.iter().enumerate() {
                tx.execute(
                    "INSERT INTO record_edges (source_id, target_id, edge_kind, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![&id_str, target.to_string(), kind, position as i64],
                )
                .map_err(storage("insert edge"))?;
            }
        }
        Ok(())
    }

    fn load_edges(conn: &Connection, id: &str, kind: &str) -> Result<Vec<RecordId>, StoreError> {
        let mut stmt = conn
            .prepare(
                "SELECT target_id FROM record_edges
                 WHERE source_id = ?1 AND edge_kind = ?2 ORDER BY position",
            )
            .map_err(storage("prepare edges"))?;
        let targets = stmt
            .query_map(params![id, kind], |row| row.get::<_, String>(0))
            .map_err(storage("query edges"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("collect edges"))?;
        targets
            .iter()
            .map(|t| Uuid::parse_str(t).map_err(storage("parse edge target")))
            .collect()
    }

    fn load_record(conn: &Connection, raw: RawRow) -> Result<ItemRecord, StoreError> {
        let dependencies = Self::load_edges(conn, &raw.id, EDGE_DEPENDS_ON)?;
        let linked_items = Self::load_edges(conn, &raw.id, EDGE_LINKS_TO)?;
        raw.into_record(dependencies, linked_items)
    }

    fn select_ids(conn: &Connection, sql: &str, id: RecordId) -> Result<Vec<RecordId>, StoreError> {
        let mut stmt = conn.prepare(sql).map_err(storage("prepare ids"))?;
        let ids = stmt
            .query_map(params![id.to_string()], |row| row.get::<_, String>(0))
            .map_err(storage("query ids"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("collect ids"))?;
        ids.iter()
            .map(|s| Uuid::parse_str(s).map_err(storage("parse id")))
            .collect()
    }
}

impl RecordStore for SqliteRecordStore {
    fn put(&self, id: Option<RecordId>, fields: ItemFields) -> Result<RecordId, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin tx"))?;

        let id = match id {
            None => {
                let id = Uuid::new_v4();
                let now = now_millis();
                Self::write_fields(&tx, id, &fields, now, now)?;
                id
            }
            Some(id) => {
                let stamps: Option<(i64, i64)> = tx
                    .query_row(
                        "SELECT created, modified FROM records WHERE id = ?1",
                        params![id.to_string()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .map_err(storage("load timestamps"))?;
                let (created_ms, modified_ms) = stamps.ok_or(StoreError::NotFound(id))?;
                let created = from_millis(created_ms)?;
                let modified = refreshed(from_millis(modified_ms)?);
                Self::write_fields(&tx, id, &fields, created, modified)?;
                id
            }
        };

        tx.commit().map_err(storage("commit"))?;
        Ok(id)
    }

    fn get(&self, id: RecordId) -> Result<Option<ItemRecord>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", COLUMNS),
                params![id.to_string()],
                RawRow::from_row,
            )
            .optional()
            .map_err(storage("query get"))?;
        raw.map(|raw| Self::load_record(&conn, raw)).transpose()
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        // Foreign key CASCADE removes the edges that originate here; edges
        // pointing here from other records are kept.
        let rows = conn
            .execute("DELETE FROM records WHERE id = ?1", params![id.to_string()])
            .map_err(storage("delete"))?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<ItemRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM records ORDER BY created DESC, rowid DESC",
                COLUMNS
            ))
            .map_err(storage("prepare list"))?;
        let raws = stmt
            .query_map([], RawRow::from_row)
            .map_err(storage("query list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("collect list"))?;
        raws.into_iter()
            .map(|raw| Self::load_record(&conn, raw))
            .collect()
    }

    fn children(&self, parent: RecordId) -> Result<Vec<RecordId>, StoreError> {
        let conn = self.lock()?;
        Self::select_ids(&conn, "SELECT id FROM records WHERE parent_id = ?1", parent)
    }

    fn dependents(&self, target: RecordId) -> Result<Vec<RecordId>, StoreError> {
        let conn = self.lock()?;
        Self::select_ids(
            &conn,
            "SELECT DISTINCT source_id FROM record_edges
             WHERE target_id = ?1 AND edge_kind = 'depends_on'",
            target,
        )
    }
}

/// Column values as read, before decoding into domain types.
struct RawRow {
    id: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    priority: String,
    status: String,
    assignee: Option<String>,
    created_by: Option<String>,
    due_date: Option<String>,
    tags: String,
    custom_fields: String,
    metadata: String,
    estimated_hours: Option<f64>,
    budget: Option<f64>,
    location: Option<String>,
    external_refs: String,
    workflow_stage: Option<String>,
    approval_required: bool,
    template_id: Option<String>,
    parent_id: Option<String>,
    attachment_ids: String,
    reminder_settings: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<i64>,
    created: i64,
    modified: i64,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            priority: row.get(4)?,
            status: row.get(5)?,
            assignee: row.get(6)?,
            created_by: row.get(7)?,
            due_date: row.get(8)?,
            tags: row.get(9)?,
            custom_fields: row.get(10)?,
            metadata: row.get(11)?,
            estimated_hours: row.get(12)?,
            budget: row.get(13)?,
            location: row.get(14)?,
            external_refs: row.get(15)?,
            workflow_stage: row.get(16)?,
            approval_required: row.get(17)?,
            template_id: row.get(18)?,
            parent_id: row.get(19)?,
            attachment_ids: row.get(20)?,
            reminder_settings: row.get(21)?,
            approved_by: row.get(22)?,
            approved_at: row.get(23)?,
            created: row.get(24)?,
            modified: row.get(25)?,
        })
    }

    fn into_record(
        self,
        dependencies: Vec<RecordId>,
        linked_items: Vec<RecordId>,
    ) -> Result<ItemRecord, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(storage("parse id"))?;
        let category = self
            .category
            .map(|c| {
                Category::parse(&c)
                    .ok_or_else(|| StoreError::Storage(format!("unknown category '{}'", c)))
            })
            .transpose()?;
        let priority = Priority::parse(&self.priority)
            .ok_or_else(|| StoreError::Storage(format!("unknown priority '{}'", self.priority)))?;
        let status = Status::parse(&self.status)
            .ok_or_else(|| StoreError::Storage(format!("unknown status '{}'", self.status)))?;
        let due_date = self
            .due_date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(storage("parse due_date")))
            .transpose()?;
        let parent_item_id = self
            .parent_id
            .map(|p| Uuid::parse_str(&p).map_err(storage("parse parent_id")))
            .transpose()?;
        let approval = match (self.approved_by, self.approved_at) {
            (Some(approver), Some(at)) => Some(Approval {
                approver,
                approved_at: from_millis(at)?,
            }),
            _ => None,
        };
        let reminder_settings: Option<Value> = self
            .reminder_settings
            .map(|s| from_json(&s))
            .transpose()?;
        let custom_fields: BTreeMap<String, Value> = from_json(&self.custom_fields)?;
        let metadata: BTreeMap<String, Value> = from_json(&self.metadata)?;

        Ok(ItemRecord {
            id,
            fields: ItemFields {
                name: self.name,
                description: self.description,
                category,
                priority,
                status,
                assignee: self.assignee,
                created_by: self.created_by,
                due_date,
                tags: from_json(&self.tags)?,
                custom_fields,
                metadata,
                estimated_hours: self.estimated_hours,
                budget: self.budget,
                location: self.location,
                external_refs: from_json(&self.external_refs)?,
                workflow_stage: self.workflow_stage,
                approval_required: self.approval_required,
                template_id: self.template_id,
                parent_item_id,
                dependencies,
                linked_items,
                attachment_ids: from_json(&self.attachment_ids)?,
                reminder_settings,
                approval,
            },
            created_at: from_millis(self.created)?,
            updated_at: from_millis(self.modified)?,
        })
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(storage("serialize"))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(storage("deserialize"))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Storage(format!("timestamp out of range: {}", ms)))
}
