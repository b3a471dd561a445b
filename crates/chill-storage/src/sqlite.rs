//! SQLite-backed content store.
//!
//! [`ContentStore`] owns one connection. Every write runs inside a
//! transaction. A store opened read-only refuses writes before they reach
//! SQLite, and SQLite's own `SQLITE_READONLY` maps to the same error.

use std::str::FromStr;

use indexmap::IndexMap;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

use chill_core::{
    normalize_path, Link, Method, Node, NodeId, Params, Route, Rule, SqlIntent, Value,
};

use crate::error::StorageError;
use crate::schema;
use crate::types::{OpenOptions, QueryRows};

#[derive(Debug)]
pub struct ContentStore {
    conn: Connection,
    read_only: bool,
}

impl ContentStore {
    /// Opens the database at `path`. Does not create the content tables.
    pub fn open(path: &str, options: OpenOptions) -> Result<Self, StorageError> {
        let conn = schema::open_database(path, options)?;
        Ok(ContentStore {
            conn,
            read_only: options.read_only,
        })
    }

    /// A fresh, initialized in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let mut store = ContentStore {
            conn: schema::open_in_memory()?,
            read_only: false,
        };
        store.init()?;
        Ok(store)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn init(&mut self) -> Result<(), StorageError> {
        self.ensure_writable()?;
        schema::init(&mut self.conn)
    }

    pub fn drop_tables(&mut self) -> Result<(), StorageError> {
        self.ensure_writable()?;
        schema::drop_tables(&mut self.conn)
    }

    pub fn schema_version(&self) -> Result<Option<i64>, StorageError> {
        schema::schema_version(&self.conn)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn insert_node(&mut self, name: &str, value: Option<&str>) -> Result<NodeId, StorageError> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO Node (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        let id = NodeId(tx.last_insert_rowid());
        tx.commit()?;
        Ok(id)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node, StorageError> {
        self.conn
            .query_row(
                "SELECT n.id, n.name, n.value, t.name, q.name
                 FROM Node AS n
                 LEFT JOIN Template AS t ON t.id = n.template_id
                 LEFT JOIN Query AS q ON q.id = n.query_id
                 WHERE n.id = ?1",
                params![id.0],
                |row| {
                    Ok(Node {
                        id: NodeId(row.get(0)?),
                        name: row.get(1)?,
                        value: row.get(2)?,
                        template: row.get(3)?,
                        query: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::NodeNotFound(id))
    }

    /// Deletes a Node. Its Links (in both directions) and Routes go with it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM Node WHERE id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(StorageError::NodeNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    pub fn insert_link(
        &mut self,
        node_id: NodeId,
        target_node_id: NodeId,
        name: Option<&str>,
    ) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.assert_node_exists(node_id)?;
        self.assert_node_exists(target_node_id)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO Node_Node (node_id, target_node_id, name) VALUES (?1, ?2, ?3)",
            params![node_id.0, target_node_id.0, name],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Outgoing Links of a Node, in insertion order.
    pub fn links_from(&self, node_id: NodeId) -> Result<Vec<Link>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, target_node_id, name FROM Node_Node
             WHERE node_id = ?1 ORDER BY rowid",
        )?;
        let links = stmt
            .query_map(params![node_id.0], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn all_links(&self) -> Result<Vec<Link>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT node_id, target_node_id, name FROM Node_Node ORDER BY rowid")?;
        let links = stmt
            .query_map([], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Node sets that link to each other in a cycle. See [`crate::graph`].
    pub fn find_link_cycles(&self) -> Result<Vec<Vec<NodeId>>, StorageError> {
        Ok(crate::graph::link_cycles(&self.all_links()?))
    }

    // -----------------------------------------------------------------------
    // Routes
    // -----------------------------------------------------------------------

    /// Binds `path` and `method` to a Node, replacing any existing binding
    /// for the same pair. Exact paths are stored normalized; patterns are
    /// stored as given. Returns the stored path.
    pub fn insert_route(
        &mut self,
        path: &str,
        node_id: NodeId,
        weight: i64,
        method: Method,
    ) -> Result<String, StorageError> {
        self.ensure_writable()?;
        self.assert_node_exists(node_id)?;
        let stored = if Rule::is_pattern(path) {
            path.to_string()
        } else {
            normalize_path(path)
        };
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO Route (path, node_id, weight, method) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (path, method)
             DO UPDATE SET node_id = excluded.node_id, weight = excluded.weight",
            params![stored, node_id.0, weight, method.as_str()],
        )?;
        tx.commit()?;
        Ok(stored)
    }

    pub fn routes_for_node(&self, node_id: NodeId) -> Result<Vec<Route>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT path, node_id, weight, method FROM Route WHERE node_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![node_id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(path, node_id, weight, method)| {
                let method = Method::from_str(&method).map_err(|e| {
                    StorageError::IntegrityError {
                        reason: format!("route '{}': {}", path, e),
                    }
                })?;
                Ok(Route {
                    path,
                    node_id: NodeId(node_id),
                    weight,
                    method,
                })
            })
            .collect()
    }

    /// The Node bound to exactly this stored path and verb.
    pub fn node_for_route(&self, path: &str, method: Method) -> Result<Option<NodeId>, StorageError> {
        let id = self
            .conn
            .query_row(
                "SELECT node_id FROM Route WHERE path = ?1 AND method = ?2",
                params![path, method.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(NodeId))
    }

    /// `(pattern, weight)` for every placeholder Route bound to `method`.
    pub fn pattern_routes(&self, method: Method) -> Result<Vec<(String, i64)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT path, weight FROM Route
             WHERE method = ?1 AND instr(path, '<') > 0
             ORDER BY id",
        )?;
        let routes = stmt
            .query_map(params![method.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, i64)>, _>>()?;
        Ok(routes
            .into_iter()
            .filter(|(path, _)| Rule::is_pattern(path))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Query and Template bindings
    // -----------------------------------------------------------------------

    /// Binds a Query by name, creating the Query row on first use.
    pub fn bind_query_to_node(&mut self, node_id: NodeId, name: &str) -> Result<(), StorageError> {
        self.bind_named(node_id, "Query", "query_id", name)
    }

    /// Binds a Template by name, creating the Template row on first use.
    pub fn bind_template_to_node(&mut self, node_id: NodeId, name: &str) -> Result<(), StorageError> {
        self.bind_named(node_id, "Template", "template_id", name)
    }

    fn bind_named(
        &mut self,
        node_id: NodeId,
        table: &str,
        column: &str,
        name: &str,
    ) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        tx.execute(
            &format!("INSERT OR IGNORE INTO {} (name) VALUES (?1)", table),
            params![name],
        )?;
        let bound_id: i64 = tx.query_row(
            &format!("SELECT id FROM {} WHERE name = ?1", table),
            params![name],
            |row| row.get(0),
        )?;
        let updated = tx.execute(
            &format!("UPDATE Node SET {} = ?1 WHERE id = ?2", column),
            params![bound_id, node_id.0],
        )?;
        if updated == 0 {
            return Err(StorageError::NodeNotFound(node_id));
        }
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ad-hoc queries
    // -----------------------------------------------------------------------

    /// Runs one statement with named parameters taken from `params`.
    ///
    /// Each `:name` (or `@name`, `$name`) placeholder binds the entry of the
    /// same name; absent entries bind NULL. The statement's intent must be
    /// permitted for `method`, and a data-modifying statement against a
    /// read-only store fails with [`StorageError::ReadOnly`].
    pub fn run_query(
        &self,
        sql: &str,
        params: &Params,
        method: Method,
    ) -> Result<QueryRows, StorageError> {
        let sql = sql.trim();
        let mut stmt = self.conn.prepare(sql)?;
        // SQLite also reports ATTACH, BEGIN and most PRAGMAs as read-only, so
        // the keyword decides and `readonly()` only vetoes a select.
        let intent = match SqlIntent::classify(sql) {
            SqlIntent::Select if !stmt.readonly() => SqlIntent::Other,
            intent => intent,
        };
        if !method.permits(intent) {
            return Err(StorageError::IntentMismatch { method, intent });
        }
        if intent != SqlIntent::Select && self.read_only {
            return Err(StorageError::ReadOnly);
        }

        for index in 1..=stmt.parameter_count() {
            let value = stmt
                .parameter_name(index)
                .map(|name| name.trim_start_matches(|c: char| matches!(c, ':' | '@' | '$')))
                .and_then(|name| params.get(name))
                .map(to_sql_value)
                .unwrap_or(SqlValue::Null);
            stmt.raw_bind_parameter(index, value)?;
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        if columns.is_empty() {
            let changes = stmt.raw_execute()?;
            return Ok(QueryRows {
                columns,
                rows: Vec::new(),
                changes,
                intent,
            });
        }

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor.next()? {
            let mut record = IndexMap::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), from_sql_ref(row.get_ref(index)?));
            }
            rows.push(record);
        }
        let changes = if intent == SqlIntent::Select { 0 } else { rows.len() };
        Ok(QueryRows {
            columns,
            rows,
            changes,
            intent,
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn ensure_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    fn assert_node_exists(&self, id: NodeId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM Node WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::NodeNotFound(id));
        }
        Ok(())
    }
}

fn link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Link> {
    Ok(Link {
        node_id: NodeId(row.get(0)?),
        target_node_id: NodeId(row.get(1)?),
        name: row.get(2)?,
    })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::List(_) | Value::Map(_) => SqlValue::Text(value.to_json().to_string()),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
