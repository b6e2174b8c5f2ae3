//! Query builder for stored measurements.
//!
//! [`MeasurementQuery`] follows the builder pattern; every filter is optional
//! and the time filters map onto the `(device_id, captured_at)` index.
//!
//! # Example
//!
//! ```
//! use ht_store::{MeasurementQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let query = MeasurementQuery::new()
//!     .device("AA:BB:CC:DD:EE:FF")
//!     .since(OffsetDateTime::now_utc() - Duration::hours(12))
//!     .oldest_first();
//!
//! let measurements = store.query_measurements(&query)?;
//! assert!(measurements.is_empty());
//! # Ok::<(), ht_store::Error>(())
//! ```

use time::OffsetDateTime;

use crate::store::unix_millis;

/// Fluent query builder for measurements.
///
/// By default results are ordered newest first.
#[derive(Debug, Default, Clone)]
pub struct MeasurementQuery {
    /// Filter by device ID.
    pub device_id: Option<String>,
    /// Only measurements captured at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Only measurements captured at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by captured_at descending.
    pub newest_first: bool,
}

impl MeasurementQuery {
    /// Create a query over all devices, all time, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by device ID.
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// Filter to measurements captured at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to measurements captured at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results chronologically.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("captured_at >= ?");
            params.push(Box::new(unix_millis(since)));
        }

        if let Some(until) = self.until {
            conditions.push("captured_at <= ?");
            params.push(Box::new(unix_millis(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        // Row id breaks ties between readings stamped in the same millisecond.
        let mut sql = format!(
            "SELECT id, device_id, captured_at, temperature_c, humidity_pct, pressure_hpa, pm25 \
             FROM measurements {} ORDER BY captured_at {}, id {}",
            where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        } else if self.offset.is_some() {
            // SQLite requires a LIMIT before OFFSET
            sql.push_str(" LIMIT -1");
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).unwrap()
    }

    #[test]
    fn test_query_new_defaults() {
        let query = MeasurementQuery::new();
        assert!(query.device_id.is_none());
        assert!(query.since.is_none());
        assert!(query.until.is_none());
        assert!(query.limit.is_none());
        assert!(query.offset.is_none());
        assert!(query.newest_first);
    }

    #[test]
    fn test_query_chaining() {
        let since = at(1_704_067_200);
        let until = at(1_735_689_599);

        let query = MeasurementQuery::new()
            .device("AA:BB")
            .since(since)
            .until(until)
            .limit(10)
            .offset(5)
            .oldest_first();

        assert_eq!(query.device_id, Some("AA:BB".to_string()));
        assert_eq!(query.since, Some(since));
        assert_eq!(query.until, Some(until));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert!(!query.newest_first);
    }

    #[test]
    fn test_build_where_empty() {
        let (where_clause, params) = MeasurementQuery::new().build_where();
        assert_eq!(where_clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_where_range() {
        let query = MeasurementQuery::new()
            .device("AA:BB")
            .since(at(1_704_067_200))
            .until(at(1_704_070_800));
        let (where_clause, params) = query.build_where();

        assert_eq!(
            where_clause,
            "WHERE device_id = ? AND captured_at >= ? AND captured_at <= ?"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_build_sql_ordering() {
        let newest = MeasurementQuery::new().build_sql();
        assert!(newest.contains("ORDER BY captured_at DESC, id DESC"));

        let oldest = MeasurementQuery::new().oldest_first().build_sql();
        assert!(oldest.contains("ORDER BY captured_at ASC, id ASC"));
    }

    #[test]
    fn test_build_sql_pagination() {
        let sql = MeasurementQuery::new().limit(50).offset(10).build_sql();
        assert!(sql.contains("LIMIT 50"));
        assert!(sql.contains("OFFSET 10"));

        let offset_only = MeasurementQuery::new().offset(10).build_sql();
        assert!(offset_only.contains("LIMIT -1 OFFSET 10"));

        let plain = MeasurementQuery::new().build_sql();
        assert!(!plain.contains("LIMIT"));
        assert!(!plain.contains("WHERE"));
    }
}
