//! PostgreSQL type mapping to JSON-serializable values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgRow, PgTypeKind, Postgres};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

/// A SQL value that can be serialized to JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<SqlValue>),
    /// A column type with no mapping; carries the type name.
    Unsupported(String),
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Bool(v) => serializer.serialize_bool(*v),
            SqlValue::I16(v) => serializer.serialize_i16(*v),
            SqlValue::I32(v) => serializer.serialize_i32(*v),
            SqlValue::I64(v) => serializer.serialize_i64(*v),
            SqlValue::F32(v) => serializer.serialize_f32(*v),
            SqlValue::F64(v) => serializer.serialize_f64(*v),
            SqlValue::String(v) => serializer.serialize_str(v),
            SqlValue::Bytes(v) => serializer.serialize_str(&format!("\\x{}", hex::encode(v))),
            // Decimal and UUID as strings to keep full precision
            SqlValue::Decimal(v) => serializer.collect_str(v),
            SqlValue::Uuid(v) => serializer.collect_str(v),
            SqlValue::Date(v) => v.serialize(serializer),
            SqlValue::Time(v) => v.serialize(serializer),
            SqlValue::DateTime(v) => v.serialize(serializer),
            SqlValue::DateTimeUtc(v) => serializer.serialize_str(&v.to_rfc3339()),
            SqlValue::Json(v) => v.serialize(serializer),
            SqlValue::Array(items) => serializer.collect_seq(items),
            SqlValue::Unsupported(type_name) => {
                serializer.collect_str(&format_args!("<unsupported type {}>", type_name))
            }
        }
    }
}

/// A single row of query results, in column order.
///
/// Serializes as a JSON object keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    values: Vec<(String, SqlValue)>,
}

impl ResultRow {
    /// Create a new result row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row with room for `columns` values.
    pub fn with_capacity(columns: usize) -> Self {
        Self {
            values: Vec::with_capacity(columns),
        }
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Insert a value. A repeated column name replaces the earlier value.
    pub fn insert(&mut self, column: String, value: SqlValue) {
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column, value)),
        }
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Outcome of running one statement on a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// The statement described a result set.
    Rows {
        /// Column names from the statement description.
        columns: Vec<String>,
        /// Materialized rows, at most the row cap.
        rows: Vec<ResultRow>,
        /// Number of rows the server returned.
        total_rows: u64,
    },
    /// The statement produced no result set.
    Affected {
        /// Rows inserted, updated or deleted.
        rows_affected: u64,
    },
}

impl StatementOutcome {
    /// Whether rows beyond the cap were dropped.
    pub fn is_truncated(&self) -> bool {
        match self {
            StatementOutcome::Rows {
                rows, total_rows, ..
            } => *total_rows > rows.len() as u64,
            StatementOutcome::Affected { .. } => false,
        }
    }
}

/// Accumulates streamed rows under a hard cap.
///
/// Every offered row is counted; only rows under the cap are converted.
#[derive(Debug)]
pub struct RowCollector {
    max_rows: usize,
    rows: Vec<ResultRow>,
    total_rows: u64,
}

impl RowCollector {
    /// Create a collector keeping at most `max_rows` rows.
    pub fn new(max_rows: usize) -> Self {
        Self {
            max_rows,
            rows: Vec::new(),
            total_rows: 0,
        }
    }

    /// Count a row, converting it only while under the cap.
    pub fn offer(&mut self, materialize: impl FnOnce() -> ResultRow) {
        self.total_rows += 1;
        if self.rows.len() < self.max_rows {
            self.rows.push(materialize());
        }
    }

    /// Finish collection.
    pub fn finish(self, columns: Vec<String>) -> StatementOutcome {
        StatementOutcome::Rows {
            columns,
            rows: self.rows,
            total_rows: self.total_rows,
        }
    }
}

/// Type mapper for converting PostgreSQL values to [`SqlValue`].
pub struct TypeMapper;

impl TypeMapper {
    /// Convert a whole row, preserving column order.
    pub fn convert_row(row: &PgRow) -> ResultRow {
        let mut result = ResultRow::with_capacity(row.columns().len());
        for (idx, col) in row.columns().iter().enumerate() {
            result.insert(col.name().to_string(), Self::extract_column(row, idx));
        }
        result
    }

    /// Extract a value from a row column, dispatching on the column type.
    pub fn extract_column(row: &PgRow, idx: usize) -> SqlValue {
        let Some(col) = row.columns().get(idx) else {
            return SqlValue::Null;
        };

        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(_) => {}
            Err(_) => return SqlValue::Null,
        }

        let type_info = col.type_info();
        let type_name = type_info.name();

        // Enum values travel as their label text
        if let PgTypeKind::Enum(_) = type_info.kind() {
            return row
                .try_get_unchecked::<String, _>(idx)
                .map(SqlValue::String)
                .unwrap_or_else(|_| SqlValue::Unsupported(type_name.to_string()));
        }

        let value = match type_name {
            "BOOL" => decode(row, idx, SqlValue::Bool),
            "INT2" => decode(row, idx, SqlValue::I16),
            "INT4" => decode(row, idx, SqlValue::I32),
            "INT8" => decode(row, idx, SqlValue::I64),
            "OID" => decode(row, idx, |v: Oid| SqlValue::I64(i64::from(v.0))),
            "FLOAT4" => decode(row, idx, SqlValue::F32),
            "FLOAT8" => decode(row, idx, SqlValue::F64),
            "NUMERIC" => decode(row, idx, SqlValue::Decimal),
            "BYTEA" => decode(row, idx, SqlValue::Bytes),
            "UUID" => decode(row, idx, SqlValue::Uuid),
            "DATE" => decode(row, idx, SqlValue::Date),
            "TIME" => decode(row, idx, SqlValue::Time),
            "TIMESTAMP" => decode(row, idx, SqlValue::DateTime),
            "TIMESTAMPTZ" => decode(row, idx, SqlValue::DateTimeUtc),
            "JSON" | "JSONB" => decode(row, idx, SqlValue::Json),
            "\"CHAR\"" => decode(row, idx, |v: i8| {
                SqlValue::String(char::from(v as u8).to_string())
            }),
            "INTERVAL" => decode(row, idx, |v: PgInterval| {
                SqlValue::String(format_interval(&v))
            }),
            "INET" => decode(row, idx, |v: IpNetwork| SqlValue::String(format_inet(v, false))),
            "CIDR" => decode(row, idx, |v: IpNetwork| SqlValue::String(format_inet(v, true))),
            "BOOL[]" => decode(row, idx, |v: Vec<Option<bool>>| array(v, SqlValue::Bool)),
            "INT2[]" => decode(row, idx, |v: Vec<Option<i16>>| array(v, SqlValue::I16)),
            "INT4[]" => decode(row, idx, |v: Vec<Option<i32>>| array(v, SqlValue::I32)),
            "INT8[]" => decode(row, idx, |v: Vec<Option<i64>>| array(v, SqlValue::I64)),
            "FLOAT8[]" => decode(row, idx, |v: Vec<Option<f64>>| array(v, SqlValue::F64)),
            "TEXT[]" | "VARCHAR[]" | "NAME[]" => {
                decode(row, idx, |v: Vec<Option<String>>| array(v, SqlValue::String))
            }
            "VOID" => Some(SqlValue::Null),
            // Textual types (TEXT, VARCHAR, BPCHAR, NAME, citext, ...)
            _ => decode(row, idx, SqlValue::String),
        };

        value.unwrap_or_else(|| SqlValue::Unsupported(type_name.to_string()))
    }
}

/// Decode a non-null column as `T`, or `None` if the type is incompatible.
fn decode<'r, T, F>(row: &'r PgRow, idx: usize, wrap: F) -> Option<SqlValue>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
    F: FnOnce(T) -> SqlValue,
{
    row.try_get::<T, _>(idx).ok().map(wrap)
}

fn array<T>(items: Vec<Option<T>>, wrap: fn(T) -> SqlValue) -> SqlValue {
    SqlValue::Array(
        items
            .into_iter()
            .map(|item| item.map(wrap).unwrap_or(SqlValue::Null))
            .collect(),
    )
}

/// Render an interval the way PostgreSQL's default `IntervalStyle` does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i32, name: &str) -> String {
        if n == 1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            let digits = format!("{frac:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Render an INET/CIDR value. INET host addresses omit the full-length
/// prefix, as PostgreSQL prints them.
fn format_inet(network: IpNetwork, always_prefix: bool) -> String {
    let full_length = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if !always_prefix && network.prefix() == full_length {
        network.ip().to_string()
    } else {
        format!("{}/{}", network.ip(), network.prefix())
    }
}

/// Lowercase hex encoding for BYTEA values.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
