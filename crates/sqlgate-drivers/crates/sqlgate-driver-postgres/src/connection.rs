//! PostgreSQL connection implementation

use async_trait::async_trait;
use bytes::BytesMut;
use sqlgate_core::{
    ColumnMeta, Connection, DriverRegistry, GateError, QueryResult, Result, Row,
    StatementResult, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row as PgRow};

use crate::POSTGRES_DRIVER_ID;
use crate::dialect::type_registry;

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match db_error.code().code() {
        "25006" => format!("read-only transaction: {}", message),
        "22007" => format!("invalid datetime format: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        code => format!("{} (code: {})", message, code),
    }
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    types: DriverRegistry,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect with a parsed libpq-style configuration
    pub async fn connect(config: tokio_postgres::Config) -> Result<Self> {
        tracing::info!(
            hosts = ?config.get_hosts(),
            database = ?config.get_dbname(),
            "connecting to PostgreSQL database"
        );

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            GateError::Connection(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::info!(database = ?config.get_dbname(), "PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            types: type_registry()?,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(GateError::Connection("connection is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        POSTGRES_DRIVER_ID
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        let client = self.client.lock().await;

        let statement = client.prepare(sql).await.map_err(|e| {
            GateError::Query(format!(
                "Failed to prepare statement: {}",
                format_postgres_error(&e)
            ))
        })?;
        let pg_params = to_pg_params(params, statement.params());
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows_affected = client.execute(&statement, &param_refs).await.map_err(|e| {
            GateError::Query(format!(
                "Failed to execute statement: {}",
                format_postgres_error(&e)
            ))
        })?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(StatementResult {
            affected_rows: rows_affected,
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let start_time = std::time::Instant::now();
        let client = self.client.lock().await;

        let statement = client.prepare(sql).await.map_err(|e| {
            GateError::Query(format!(
                "Failed to prepare query: {}",
                format_postgres_error(&e)
            ))
        })?;
        let pg_params = to_pg_params(params, statement.params());
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = client.query(&statement, &param_refs).await.map_err(|e| {
            GateError::Query(format!(
                "Failed to execute query: {}",
                format_postgres_error(&e)
            ))
        })?;

        // Column metadata comes from the statement so empty results keep it
        let types = self.types.resolve(POSTGRES_DRIVER_ID)?;
        let mut columns = Vec::new();
        let mut column_names = Vec::new();
        for (idx, col) in statement.columns().iter().enumerate() {
            let name = col.name().to_string();
            let data_type = col.type_().name().to_string();
            column_names.push(name.clone());
            columns.push(ColumnMeta {
                name,
                semantic_type: types.semantic_type(&data_type),
                data_type,
                nullable: true,
                ordinal: idx,
            });
        }

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(column_names.clone(), values));
        }

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );
        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
            warnings: Vec::new(),
        })
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.try_lock().is_ok_and(|c| c.is_closed())
    }
}

/// A bound parameter in the representation the server expects for its slot
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
}

fn to_pg_params(values: &[Value], types: &[Type]) -> Vec<PgValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| match types.get(i) {
            Some(ty) => PgValue::for_type(value, ty),
            None => PgValue::from_value(value),
        })
        .collect()
}

impl PgValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
        }
    }

    /// Narrow integers and parse text so the binary encoding matches `ty`
    fn for_type(value: &Value, ty: &Type) -> Self {
        match (value, ty.name()) {
            (Value::Int64(v), "int2") => i16::try_from(*v).map_or(PgValue::Int64(*v), PgValue::Int16),
            (Value::Int64(v), "int4") => i32::try_from(*v).map_or(PgValue::Int64(*v), PgValue::Int32),
            (Value::Int64(v), "float8") => PgValue::Float64(*v as f64),
            (Value::Float64(v), "float4") => PgValue::Float32(*v as f32),
            (Value::DateTimeUtc(v), "timestamp") => PgValue::DateTime(v.naive_utc()),
            (Value::DateTime(v), "timestamptz") => PgValue::DateTimeUtc(v.and_utc()),
            (Value::String(s), name) => {
                Self::parse_text(s, name).unwrap_or_else(|| PgValue::String(s.clone()))
            }
            _ => Self::from_value(value),
        }
    }

    fn parse_text(s: &str, type_name: &str) -> Option<Self> {
        Some(match type_name {
            "bool" => PgValue::Bool(s.parse().ok()?),
            "int2" => PgValue::Int16(s.parse().ok()?),
            "int4" => PgValue::Int32(s.parse().ok()?),
            "int8" => PgValue::Int64(s.parse().ok()?),
            "float4" => PgValue::Float32(s.parse().ok()?),
            "float8" => PgValue::Float64(s.parse().ok()?),
            "uuid" => PgValue::Uuid(s.parse().ok()?),
            "date" => PgValue::Date(s.parse().ok()?),
            "time" => PgValue::Time(s.parse().ok()?),
            "timestamp" => PgValue::DateTime(parse_timestamp(s)?),
            "timestamptz" => PgValue::DateTimeUtc(
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.to_utc())
                    .ok()
                    .or_else(|| parse_timestamp(s).map(|dt| dt.and_utc()))?,
            ),
            _ => return None,
        })
    }
}

fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(s, format).ok())
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// NUMERIC in its exact decimal text form
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Decode the binary NUMERIC layout: digit count, weight, sign and display
/// scale, followed by base-10000 digit groups.
fn decode_numeric(raw: &[u8]) -> std::result::Result<String, Box<dyn std::error::Error + Sync + Send>> {
    let word = |i: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*raw.get(i * 2)?, *raw.get(i * 2 + 1)?]))
    };
    let (Some(ndigits), Some(weight), Some(sign), Some(dscale)) = (word(0), word(1), word(2), word(3))
    else {
        return Err("invalid NUMERIC payload".into());
    };
    if sign == 0xC000 {
        return Ok("NaN".to_string());
    }

    let groups = (0..ndigits as usize)
        .map(|i| word(4 + i).filter(|g| *g <= 9999))
        .collect::<Option<Vec<u16>>>()
        .ok_or("invalid NUMERIC digits")?;

    // Group `i` carries the base-10000 exponent `weight - i`
    let weight = weight as i16 as i32;
    let group_at = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| groups.get(i).copied())
            .unwrap_or(0)
    };

    let integer = if weight < 0 {
        "0".to_string()
    } else {
        let mut integer = group_at(0).to_string();
        for i in 1..=weight {
            integer.push_str(&format!("{:04}", group_at(i)));
        }
        integer
    };

    let dscale = dscale as usize;
    let mut fraction = String::with_capacity(dscale + 4);
    for exponent in 1..=dscale.div_ceil(4) as i32 {
        fraction.push_str(&format!("{:04}", group_at(weight + exponent)));
    }
    fraction.truncate(dscale);

    let mut output = String::new();
    if sign == 0x4000 {
        output.push('-');
    }
    output.push_str(&integer);
    if !fraction.is_empty() {
        output.push('.');
        output.push_str(&fraction);
    }
    Ok(output)
}

/// Text fallback for types without a dedicated mapping (enums, domains)
struct PgText(String);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(String::from_utf8_lossy(raw).into_owned()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Result<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| GateError::Query(format!("Failed to read column {}: {}", idx, e)))
}

fn postgres_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let value = match row.columns()[idx].type_().name() {
        "bool" => get::<bool>(row, idx)?.map(Value::Bool),
        "int2" => get::<i16>(row, idx)?.map(|v| Value::Int64(v.into())),
        "int4" => get::<i32>(row, idx)?.map(|v| Value::Int64(v.into())),
        "int8" => get::<i64>(row, idx)?.map(Value::Int64),
        "float4" => get::<f32>(row, idx)?.map(|v| Value::Float64(v.into())),
        "float8" => get::<f64>(row, idx)?.map(Value::Float64),
        "numeric" => get::<PgNumeric>(row, idx)?.map(|v| Value::Decimal(v.0)),
        "bytea" => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx)?.map(|v| Value::String(v.to_string())),
        "date" => get::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::DateTimeUtc),
        // Text, enums and domains arrive as UTF-8
        _ => get::<PgText>(row, idx)?.map(|v| Value::String(v.0)),
    };
    Ok(value.unwrap_or(Value::Null))
}
