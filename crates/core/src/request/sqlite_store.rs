//! SQLite-backed request store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CreateRequest, GroupBy, InternalNote, Priority, RequestError, RequestFilter, RequestStatus,
    RequestStore, ServiceRequest, SortOrder, StatusHistoryEntry,
};

/// SQLite-backed request store.
pub struct SqliteRequestStore {
    conn: Mutex<Connection>,
}

impl SqliteRequestStore {
    /// Create a new SQLite request store, creating the database file and
    /// tables if needed.
    pub fn new(path: &Path) -> Result<Self, RequestError> {
        let conn = Connection::open(path).map_err(|e| RequestError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite request store (useful for testing).
    pub fn in_memory() -> Result<Self, RequestError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RequestError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RequestError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS service_requests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                service_type_id TEXT NOT NULL,
                status TEXT NOT NULL,
                assigned_operator_id TEXT,
                priority TEXT NOT NULL DEFAULT 'normal',
                internal_notes TEXT NOT NULL DEFAULT '[]',
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_service_requests_status ON service_requests(status);
            CREATE INDEX IF NOT EXISTS idx_service_requests_user_id ON service_requests(user_id);
            CREATE INDEX IF NOT EXISTS idx_service_requests_operator ON service_requests(assigned_operator_id);
            CREATE INDEX IF NOT EXISTS idx_service_requests_created_at ON service_requests(created_at);

            CREATE TABLE IF NOT EXISTS status_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_request_id TEXT NOT NULL,
                from_status TEXT,
                to_status TEXT NOT NULL,
                changed_by_id TEXT NOT NULL,
                notes TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_status_history_request ON status_history(service_request_id);
            CREATE INDEX IF NOT EXISTS idx_status_history_created_at ON status_history(created_at);
            "#,
        )
        .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &RequestFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref user_id) = filter.user_id {
            conditions.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        if let Some(ref operator_id) = filter.assigned_operator_id {
            conditions.push("assigned_operator_id = ?");
            params.push(Box::new(operator_id.clone()));
        }

        if let Some(ref service_type_id) = filter.service_type_id {
            conditions.push("service_type_id = ?");
            params.push(Box::new(service_type_id.clone()));
        }

        if let Some(ref from) = filter.created_from {
            conditions.push("created_at >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.created_to {
            conditions.push("created_at <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn order_clause(sort: SortOrder) -> &'static str {
        match sort {
            SortOrder::CreatedDesc => "ORDER BY created_at DESC",
            SortOrder::CreatedAsc => "ORDER BY created_at ASC",
            SortOrder::UpdatedDesc => "ORDER BY updated_at DESC",
        }
    }

    fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    format!("invalid timestamp: {}", e).into(),
                )
            })
    }

    fn parse_status(idx: usize, s: &str) -> rusqlite::Result<RequestStatus> {
        RequestStatus::parse(s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("unknown status: {}", s).into(),
            )
        })
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<ServiceRequest> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let service_type_id: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let assigned_operator_id: Option<String> = row.get(4)?;
        let priority_str: String = row.get(5)?;
        let notes_json: String = row.get(6)?;
        let version: i64 = row.get(7)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        let status = Self::parse_status(3, &status_str)?;
        let priority = Priority::parse(&priority_str).unwrap_or_default();
        let internal_notes: Vec<InternalNote> = serde_json::from_str(&notes_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("invalid internal notes: {}", e).into(),
            )
        })?;
        let created_at = Self::parse_timestamp(8, &created_at_str)?;
        let updated_at = Self::parse_timestamp(9, &updated_at_str)?;

        Ok(ServiceRequest {
            id,
            user_id,
            service_type_id,
            status,
            assigned_operator_id,
            priority,
            internal_notes,
            version,
            created_at,
            updated_at,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, user_id, service_type_id, status, \
        assigned_operator_id, priority, internal_notes, version, created_at, updated_at";
}

impl RequestStore for SqliteRequestStore {
    fn create(&self, request: CreateRequest) -> Result<ServiceRequest, RequestError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = RequestStatus::Draft;

        conn.execute(
            "INSERT INTO service_requests (id, user_id, service_type_id, status, priority, internal_notes, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, '[]', 0, ?, ?)",
            params![
                id,
                request.user_id,
                request.service_type_id,
                status.as_str(),
                request.priority.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(ServiceRequest {
            id,
            user_id: request.user_id,
            service_type_id: request.service_type_id,
            status,
            assigned_operator_id: None,
            priority: request.priority,
            internal_notes: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<ServiceRequest>, RequestError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM service_requests WHERE id = ?",
                Self::SELECT_COLUMNS
            ),
            params![id],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RequestError::Database(e.to_string())),
        }
    }

    fn save(&self, request: &ServiceRequest) -> Result<ServiceRequest, RequestError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let notes_json = serde_json::to_string(&request.internal_notes)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        // Conditional update keyed on the version the caller read. Zero
        // affected rows with an existing record means a concurrent writer
        // won the race.
        let affected = conn
            .execute(
                "UPDATE service_requests SET status = ?, assigned_operator_id = ?, priority = ?, \
                 internal_notes = ?, version = version + 1, updated_at = ? \
                 WHERE id = ? AND version = ?",
                params![
                    request.status.as_str(),
                    request.assigned_operator_id,
                    request.priority.as_str(),
                    notes_json,
                    now.to_rfc3339(),
                    request.id,
                    request.version,
                ],
            )
            .map_err(|e| RequestError::Database(e.to_string()))?;

        if affected == 0 {
            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM service_requests WHERE id = ?",
                    params![request.id],
                    |row| row.get(0),
                )
                .map_err(|e| RequestError::Database(e.to_string()))?;

            return if exists == 0 {
                Err(RequestError::NotFound(format!(
                    "service request {}",
                    request.id
                )))
            } else {
                Err(RequestError::Conflict(request.id.clone()))
            };
        }

        Ok(ServiceRequest {
            version: request.version + 1,
            updated_at: now,
            ..request.clone()
        })
    }

    fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), RequestError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO status_history (service_request_id, from_status, to_status, changed_by_id, notes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.service_request_id,
                entry.from_status.map(|s| s.as_str()),
                entry.to_status.as_str(),
                entry.changed_by_id,
                entry.notes,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(())
    }

    fn history(&self, request_id: &str) -> Result<Vec<StatusHistoryEntry>, RequestError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT service_request_id, from_status, to_status, changed_by_id, notes, created_at \
                 FROM status_history WHERE service_request_id = ? ORDER BY created_at ASC, id ASC",
            )
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![request_id], |row| {
                let service_request_id: String = row.get(0)?;
                let from_status: Option<String> = row.get(1)?;
                let to_status_str: String = row.get(2)?;
                let changed_by_id: String = row.get(3)?;
                let notes: Option<String> = row.get(4)?;
                let created_at_str: String = row.get(5)?;

                let from_status = match from_status {
                    Some(s) => Some(Self::parse_status(1, &s)?),
                    None => None,
                };
                let to_status = Self::parse_status(2, &to_status_str)?;
                let created_at = Self::parse_timestamp(5, &created_at_str)?;

                Ok(StatusHistoryEntry {
                    service_request_id,
                    from_status,
                    to_status,
                    changed_by_id,
                    notes,
                    created_at,
                })
            })
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row_result in rows {
            entries.push(row_result.map_err(|e| RequestError::Database(e.to_string()))?);
        }

        Ok(entries)
    }

    fn list(&self, filter: &RequestFilter) -> Result<(Vec<ServiceRequest>, i64), RequestError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM service_requests {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn
            .query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM service_requests {} {} LIMIT ? OFFSET ?",
            Self::SELECT_COLUMNS,
            where_clause,
            Self::order_clause(filter.sort),
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_request)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut requests = Vec::new();
        for row_result in rows {
            requests.push(row_result.map_err(|e| RequestError::Database(e.to_string()))?);
        }

        Ok((requests, total))
    }

    fn count(&self, filter: &RequestFilter) -> Result<i64, RequestError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM service_requests {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(count)
    }

    fn count_grouped(
        &self,
        group: GroupBy,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(String, i64)>, RequestError> {
        let conn = self.conn.lock().unwrap();

        let column = match group {
            GroupBy::ServiceType => "service_type_id",
            GroupBy::Priority => "priority",
        };

        let sql = format!(
            "SELECT {col}, COUNT(*) FROM service_requests \
             WHERE created_at >= ? AND created_at <= ? \
             GROUP BY {col} ORDER BY {col}",
            col = column
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![from.to_rfc3339(), to.to_rfc3339()], |row| {
                let key: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((key, count))
            })
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut groups = Vec::new();
        for row_result in rows {
            groups.push(row_result.map_err(|e| RequestError::Database(e.to_string()))?);
        }

        Ok(groups)
    }
}
