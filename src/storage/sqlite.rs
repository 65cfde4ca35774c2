use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{
    Collection, FieldDataType, FieldMapping, Integration, LogicalField, LogicalSchema,
    PhysicalField, SchemaMapping,
};

/// SQLite-backed catalog store for integrations, discovered collections and
/// fields, logical schemas, and schema mappings.
/// Uses tokio::Mutex for async-friendly locking.
pub struct CatalogStorage {
    conn: Arc<Mutex<Connection>>,
}

fn metadata_to_sql(metadata: &serde_json::Value) -> Option<String> {
    if metadata.is_null() {
        None
    } else {
        Some(metadata.to_string())
    }
}

fn metadata_from_sql(raw: Option<String>) -> serde_json::Value {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(serde_json::Value::Null)
}

impl CatalogStorage {
    /// Create a new catalog storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            let mut cleaned = path_str.trim_start_matches("sqlite:");
            cleaned = cleaned.trim_start_matches("//");
            cleaned
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS integrations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                integration_type TEXT NOT NULL,
                configuration TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                integration_id TEXT NOT NULL,
                name TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (integration_id) REFERENCES integrations(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS physical_fields (
                id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL,
                name TEXT NOT NULL,
                data_type TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS logical_schemas (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                description TEXT,
                version TEXT,
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS logical_fields (
                id TEXT PRIMARY KEY,
                schema_id TEXT NOT NULL,
                name TEXT NOT NULL,
                data_type TEXT NOT NULL,
                is_required INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (schema_id) REFERENCES logical_schemas(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS schema_mappings (
                id TEXT PRIMARY KEY,
                logical_schema_id TEXT NOT NULL,
                collection_id TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (logical_schema_id) REFERENCES logical_schemas(id) ON DELETE CASCADE,
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS field_mappings (
                id TEXT PRIMARY KEY,
                mapping_id TEXT NOT NULL,
                logical_field_id TEXT NOT NULL,
                physical_field_id TEXT NOT NULL,
                transformation TEXT,
                confidence REAL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (mapping_id) REFERENCES schema_mappings(id) ON DELETE CASCADE,
                FOREIGN KEY (logical_field_id) REFERENCES logical_fields(id) ON DELETE CASCADE,
                FOREIGN KEY (physical_field_id) REFERENCES physical_fields(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        // Indexes for the lookups the discovery pipeline and query compiler make
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_collections_integration ON collections(integration_id, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_physical_fields_collection ON physical_fields(collection_id, name)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_logical_fields_schema ON logical_fields(schema_id, name)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_schema_mappings_schema ON schema_mappings(logical_schema_id, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_field_mappings_mapping ON field_mappings(mapping_id)",
            [],
        )?;

        Ok(())
    }

    // ==================== Integrations ====================

    /// Save an integration (insert or replace)
    pub async fn save_integration(&self, integration: &Integration) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO integrations
            (id, user_id, name, integration_type, configuration, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            rusqlite::params![
                integration.id,
                integration.user_id,
                integration.name,
                integration.integration_type,
                integration.configuration.to_string(),
                if integration.is_active { 1 } else { 0 },
                integration.created_at.to_rfc3339(),
                integration.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get an integration by ID
    pub async fn get_integration(&self, id: &str) -> SqliteResult<Option<Integration>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, integration_type, configuration, is_active, created_at, updated_at
             FROM integrations WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(Integration {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                integration_type: row.get(3)?,
                configuration: metadata_from_sql(row.get(4)?),
                is_active: row.get::<_, i32>(5)? == 1,
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(7)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(integration) => Ok(Some(integration)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List all integrations
    pub async fn list_integrations(&self) -> SqliteResult<Vec<Integration>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, integration_type, configuration, is_active, created_at, updated_at
             FROM integrations ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Integration {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                integration_type: row.get(3)?,
                configuration: metadata_from_sql(row.get(4)?),
                is_active: row.get::<_, i32>(5)? == 1,
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(7)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    /// Delete an integration
    pub async fn delete_integration(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM integrations WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(rows_affected > 0)
    }

    // ==================== Collections ====================

    /// Create a collection. Plain insert: re-discovery appends new rows
    /// rather than upserting.
    pub async fn create_collection(&self, collection: &Collection) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO collections (id, integration_id, name, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            rusqlite::params![
                collection.id,
                collection.integration_id,
                collection.name,
                metadata_to_sql(&collection.metadata),
                collection.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a collection by ID
    pub async fn get_collection(&self, id: &str) -> SqliteResult<Option<Collection>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, integration_id, name, metadata, created_at FROM collections WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(Collection {
                id: row.get(0)?,
                integration_id: row.get(1)?,
                name: row.get(2)?,
                metadata: metadata_from_sql(row.get(3)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(collection) => Ok(Some(collection)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List collections for an integration, most recently created first
    pub async fn find_collections_by_integration(
        &self,
        integration_id: &str,
        limit: Option<usize>,
    ) -> SqliteResult<Vec<Collection>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, integration_id, name, metadata, created_at
             FROM collections
             WHERE integration_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(rusqlite::params![integration_id, limit], |row| {
            Ok(Collection {
                id: row.get(0)?,
                integration_id: row.get(1)?,
                name: row.get(2)?,
                metadata: metadata_from_sql(row.get(3)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    // ==================== Physical fields ====================

    /// Create a physical field
    pub async fn create_physical_field(&self, field: &PhysicalField) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO physical_fields (id, collection_id, name, data_type, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            rusqlite::params![
                field.id,
                field.collection_id,
                field.name,
                field.data_type.as_str(),
                metadata_to_sql(&field.metadata),
                field.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a physical field by ID
    pub async fn get_physical_field(&self, id: &str) -> SqliteResult<Option<PhysicalField>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, collection_id, name, data_type, metadata, created_at
             FROM physical_fields WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(PhysicalField {
                id: row.get(0)?,
                collection_id: row.get(1)?,
                name: row.get(2)?,
                data_type: FieldDataType::parse(&row.get::<_, String>(3)?)
                    .unwrap_or(FieldDataType::String),
                metadata: metadata_from_sql(row.get(4)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(field) => Ok(Some(field)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List physical fields of a collection, sorted by name
    pub async fn find_fields_by_collection(
        &self,
        collection_id: &str,
    ) -> SqliteResult<Vec<PhysicalField>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, collection_id, name, data_type, metadata, created_at
             FROM physical_fields
             WHERE collection_id = ?1
             ORDER BY name ASC",
        )?;

        let rows = stmt.query_map(rusqlite::params![collection_id], |row| {
            Ok(PhysicalField {
                id: row.get(0)?,
                collection_id: row.get(1)?,
                name: row.get(2)?,
                data_type: FieldDataType::parse(&row.get::<_, String>(3)?)
                    .unwrap_or(FieldDataType::String),
                metadata: metadata_from_sql(row.get(4)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    // ==================== Logical schemas ====================

    /// Create a logical schema together with its fields
    pub async fn create_logical_schema(
        &self,
        schema: &LogicalSchema,
        fields: &[LogicalField],
    ) -> SqliteResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO logical_schemas (id, name, description, version, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                schema.id,
                schema.name,
                schema.description,
                schema.version,
                metadata_to_sql(&schema.metadata),
                schema.created_at.to_rfc3339(),
                schema.updated_at.to_rfc3339(),
            ],
        )?;

        for field in fields {
            tx.execute(
                r#"
                INSERT INTO logical_fields (id, schema_id, name, data_type, is_required, description, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                rusqlite::params![
                    field.id,
                    field.schema_id,
                    field.name,
                    field.data_type.as_str(),
                    if field.is_required { 1 } else { 0 },
                    field.description,
                    field.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()
    }

    /// Get a logical schema by ID
    pub async fn get_logical_schema(&self, id: &str) -> SqliteResult<Option<LogicalSchema>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, version, metadata, created_at, updated_at
             FROM logical_schemas WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(LogicalSchema {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                version: row.get(3)?,
                metadata: metadata_from_sql(row.get(4)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(schema) => Ok(Some(schema)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a logical schema by name
    pub async fn find_schema_by_name(&self, name: &str) -> SqliteResult<Option<LogicalSchema>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, version, metadata, created_at, updated_at
             FROM logical_schemas WHERE name = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![name], |row| {
            Ok(LogicalSchema {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                version: row.get(3)?,
                metadata: metadata_from_sql(row.get(4)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(schema) => Ok(Some(schema)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List all logical schemas
    pub async fn list_logical_schemas(&self) -> SqliteResult<Vec<LogicalSchema>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, version, metadata, created_at, updated_at
             FROM logical_schemas ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(LogicalSchema {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                version: row.get(3)?,
                metadata: metadata_from_sql(row.get(4)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    /// Update a logical schema
    pub async fn update_logical_schema(&self, schema: &LogicalSchema) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            r#"
            UPDATE logical_schemas
            SET name = ?1, description = ?2, version = ?3, metadata = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
            rusqlite::params![
                schema.name,
                schema.description,
                schema.version,
                metadata_to_sql(&schema.metadata),
                schema.updated_at.to_rfc3339(),
                schema.id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a logical schema (CASCADE removes fields and mappings)
    pub async fn delete_logical_schema(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM logical_schemas WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(rows_affected > 0)
    }

    // ==================== Logical fields ====================

    /// Create a logical field under an existing schema
    pub async fn create_logical_field(&self, field: &LogicalField) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO logical_fields (id, schema_id, name, data_type, is_required, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                field.id,
                field.schema_id,
                field.name,
                field.data_type.as_str(),
                if field.is_required { 1 } else { 0 },
                field.description,
                field.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a logical field by ID
    pub async fn get_logical_field(&self, id: &str) -> SqliteResult<Option<LogicalField>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, schema_id, name, data_type, is_required, description, created_at
             FROM logical_fields WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(LogicalField {
                id: row.get(0)?,
                schema_id: row.get(1)?,
                name: row.get(2)?,
                data_type: FieldDataType::parse(&row.get::<_, String>(3)?)
                    .unwrap_or(FieldDataType::String),
                is_required: row.get::<_, i32>(4)? == 1,
                description: row.get(5)?,
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(field) => Ok(Some(field)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List logical fields of a schema, sorted by name
    pub async fn find_fields_by_schema(&self, schema_id: &str) -> SqliteResult<Vec<LogicalField>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, schema_id, name, data_type, is_required, description, created_at
             FROM logical_fields
             WHERE schema_id = ?1
             ORDER BY name ASC",
        )?;

        let rows = stmt.query_map(rusqlite::params![schema_id], |row| {
            Ok(LogicalField {
                id: row.get(0)?,
                schema_id: row.get(1)?,
                name: row.get(2)?,
                data_type: FieldDataType::parse(&row.get::<_, String>(3)?)
                    .unwrap_or(FieldDataType::String),
                is_required: row.get::<_, i32>(4)? == 1,
                description: row.get(5)?,
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    /// Update a logical field
    pub async fn update_logical_field(&self, field: &LogicalField) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            r#"
            UPDATE logical_fields
            SET name = ?1, data_type = ?2, is_required = ?3, description = ?4
            WHERE id = ?5
            "#,
            rusqlite::params![
                field.name,
                field.data_type.as_str(),
                if field.is_required { 1 } else { 0 },
                field.description,
                field.id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a logical field
    pub async fn delete_logical_field(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM logical_fields WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(rows_affected > 0)
    }

    // ==================== Schema mappings ====================

    /// Create a schema-to-collection mapping together with its field mappings
    pub async fn create_mapping(
        &self,
        mapping: &SchemaMapping,
        field_mappings: &[FieldMapping],
    ) -> SqliteResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO schema_mappings (id, logical_schema_id, collection_id, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            rusqlite::params![
                mapping.id,
                mapping.logical_schema_id,
                mapping.collection_id,
                metadata_to_sql(&mapping.metadata),
                mapping.created_at.to_rfc3339(),
                mapping.updated_at.to_rfc3339(),
            ],
        )?;

        for field_mapping in field_mappings {
            tx.execute(
                r#"
                INSERT INTO field_mappings
                (id, mapping_id, logical_field_id, physical_field_id, transformation, confidence, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                rusqlite::params![
                    field_mapping.id,
                    field_mapping.mapping_id,
                    field_mapping.logical_field_id,
                    field_mapping.physical_field_id,
                    field_mapping.transformation,
                    field_mapping.confidence,
                    field_mapping.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()
    }

    /// Get a schema mapping by ID
    pub async fn get_mapping(&self, id: &str) -> SqliteResult<Option<SchemaMapping>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, logical_schema_id, collection_id, metadata, created_at, updated_at
             FROM schema_mappings WHERE id = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(SchemaMapping {
                id: row.get(0)?,
                logical_schema_id: row.get(1)?,
                collection_id: row.get(2)?,
                metadata: metadata_from_sql(row.get(3)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List mappings for a logical schema, most recently created first
    pub async fn find_mappings_by_schema(
        &self,
        logical_schema_id: &str,
    ) -> SqliteResult<Vec<SchemaMapping>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, logical_schema_id, collection_id, metadata, created_at, updated_at
             FROM schema_mappings
             WHERE logical_schema_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(rusqlite::params![logical_schema_id], |row| {
            Ok(SchemaMapping {
                id: row.get(0)?,
                logical_schema_id: row.get(1)?,
                collection_id: row.get(2)?,
                metadata: metadata_from_sql(row.get(3)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }

    /// Find the mapping between a logical schema and a collection, if any
    pub async fn find_mapping_by_schema_and_collection(
        &self,
        logical_schema_id: &str,
        collection_id: &str,
    ) -> SqliteResult<Option<SchemaMapping>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, logical_schema_id, collection_id, metadata, created_at, updated_at
             FROM schema_mappings
             WHERE logical_schema_id = ?1 AND collection_id = ?2",
        )?;

        let result = stmt.query_row(rusqlite::params![logical_schema_id, collection_id], |row| {
            Ok(SchemaMapping {
                id: row.get(0)?,
                logical_schema_id: row.get(1)?,
                collection_id: row.get(2)?,
                metadata: metadata_from_sql(row.get(3)?),
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        });

        match result {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a schema mapping (CASCADE removes its field mappings)
    pub async fn delete_mapping(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM schema_mappings WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(rows_affected > 0)
    }

    // ==================== Field mappings ====================

    /// Delete all field mappings under a schema mapping
    pub async fn delete_field_mappings_by_mapping(&self, mapping_id: &str) -> SqliteResult<usize> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM field_mappings WHERE mapping_id = ?1",
            rusqlite::params![mapping_id],
        )?;
        Ok(rows_affected)
    }

    /// Bulk-insert field mappings
    pub async fn create_field_mappings(&self, field_mappings: &[FieldMapping]) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        for field_mapping in field_mappings {
            conn.execute(
                r#"
                INSERT INTO field_mappings
                (id, mapping_id, logical_field_id, physical_field_id, transformation, confidence, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                rusqlite::params![
                    field_mapping.id,
                    field_mapping.mapping_id,
                    field_mapping.logical_field_id,
                    field_mapping.physical_field_id,
                    field_mapping.transformation,
                    field_mapping.confidence,
                    field_mapping.created_at.to_rfc3339(),
                ],
            )?;
        }
        Ok(())
    }

    /// List field mappings under a schema mapping, in insertion order
    pub async fn find_field_mappings_by_mapping(
        &self,
        mapping_id: &str,
    ) -> SqliteResult<Vec<FieldMapping>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, mapping_id, logical_field_id, physical_field_id, transformation, confidence, created_at
             FROM field_mappings
             WHERE mapping_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(rusqlite::params![mapping_id], |row| {
            Ok(FieldMapping {
                id: row.get(0)?,
                mapping_id: row.get(1)?,
                logical_field_id: row.get(2)?,
                physical_field_id: row.get(3)?,
                transformation: row.get(4)?,
                confidence: row.get(5)?,
                created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                    .unwrap()
                    .with_timezone(&chrono::Utc),
            })
        })?;

        rows.collect()
    }
}
