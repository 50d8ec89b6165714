//! MySQL transport.
//!
//! `details.SQL` is a statement (or an array of fragments) whose `:COL_MAP`
//! token expands to the select list from `details.COL_MAP`, falling back to
//! the parent container's. `:name` tokens are bound positionally from the
//! call params, or from the global params when the call carries none.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::future::FutureExt;
use request_builder_core::sql::{bind_named_params, join_sql, replace_column_map, COL_MAP_KEY};
use request_builder_core::RequestObject;
use serde_json::{Map, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, error, info, warn};

use crate::config::MysqlConfig;
use crate::error::OperationError;
use crate::module::{failing_fn, AsyncFn, AsyncModule, ModuleContext};

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Connection pool created on first use, so loading the module needs neither
/// a reachable server nor a running runtime.
struct LazyPool {
    options: MySqlConnectOptions,
    max_connections: u32,
    pool: OnceLock<MySqlPool>,
}

impl LazyPool {
    fn get(&self) -> MySqlPool {
        self.pool
            .get_or_init(|| {
                debug!(max_connections = self.max_connections, "opening mysql pool");
                MySqlPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect_lazy_with(self.options.clone())
            })
            .clone()
    }
}

pub struct MysqlModule {
    pool: Arc<LazyPool>,
}

impl MysqlModule {
    pub const NAME: &'static str = "mysql";

    #[must_use]
    pub fn new(config: &MysqlConfig) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);
        if let Some(database) = &config.database {
            options = options.database(database);
        }
        Self {
            pool: Arc::new(LazyPool {
                options,
                max_connections: config.connection_limit,
                pool: OnceLock::new(),
            }),
        }
    }
}

#[async_trait]
impl AsyncModule for MysqlModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn async_fn(
        &self,
        details: &Value,
        parent_details: Option<&Value>,
        ctx: &ModuleContext,
    ) -> Option<AsyncFn> {
        let statement = match prepare_statement(details, parent_details) {
            Ok(statement) => Arc::new(statement),
            Err(err) => return Some(failing_fn(err)),
        };
        let single_record = details
            .get("singleRecord")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let global_params = Arc::new(ctx.settings().params().cloned());
        let pool = Arc::clone(&self.pool);

        Some(Arc::new(move |request: RequestObject| {
            let statement = Arc::clone(&statement);
            let global_params = Arc::clone(&global_params);
            let pool = Arc::clone(&pool);
            async move {
                let params = request.params.as_ref().or((*global_params).as_ref());
                let rows = execute(&pool.get(), &statement, params).await?;
                Ok(shape_rows(rows, single_record, &statement))
            }
            .boxed()
        }))
    }

    async fn close_connections(&self) -> anyhow::Result<()> {
        if let Some(pool) = self.pool.pool.get() {
            pool.close().await;
            info!("mysql pool closed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn prepare_statement(details: &Value, parent_details: Option<&Value>) -> Result<String, OperationError> {
    let sql = join_sql(details.get("SQL")).ok_or_else(|| {
        OperationError::invalid_definition("mysql operation requires `SQL` as a string or an array of strings")
    })?;
    let col_map = details
        .get(COL_MAP_KEY)
        .and_then(Value::as_object)
        .or_else(|| parent_details?.get(COL_MAP_KEY)?.as_object());
    Ok(replace_column_map(&sql, col_map))
}

async fn execute(
    pool: &MySqlPool,
    statement: &str,
    params: Option<&Map<String, Value>>,
) -> Result<Vec<Value>, OperationError> {
    let bound = bind_named_params(statement, params);
    debug!(sql = %bound.sql, binds = bound.binds.len(), "executing statement");

    let query = bound
        .binds
        .iter()
        .fold(sqlx::query(&bound.sql), bind_value);
    let rows = query.fetch_all(pool).await.map_err(|err| {
        error!(sql = %bound.sql, error = %err, "mysql query failed");
        OperationError::transport(MysqlModule::NAME, &err)
    })?;
    Ok(rows.iter().map(row_to_json).collect())
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else if let Some(uint) = number.as_u64() {
                query.bind(uint)
            } else {
                query.bind(number.as_f64().unwrap_or_default())
            }
        }
        Value::String(text) => query.bind(text.clone()),
        other => query.bind(other.to_string()),
    }
}

/// With `single_record`, exactly one row resolves as the row itself. Zero or
/// several rows resolve as `{}`, with a warning for several.
fn shape_rows(rows: Vec<Value>, single_record: bool, statement: &str) -> Value {
    if !single_record {
        return Value::Array(rows);
    }
    if rows.len() > 1 {
        warn!(sql = statement, rows = rows.len(), "singleRecord query returned several rows");
        return Value::Object(Map::new());
    }
    rows.into_iter()
        .next()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    Double,
    Text,
    Bytes,
    Date,
    DateTime,
    Timestamp,
    Time,
    Json,
    Bit,
}

impl ColumnKind {
    fn classify(type_name: &str) -> Option<Self> {
        if type_name.ends_with(" UNSIGNED") {
            return Some(Self::Unsigned);
        }
        let kind = match type_name {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => Self::Signed,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            // decimals keep their exact text
            "DECIMAL" | "ENUM" | "SET" => Self::Text,
            "DATE" => Self::Date,
            "DATETIME" => Self::DateTime,
            "TIMESTAMP" => Self::Timestamp,
            "TIME" => Self::Time,
            "JSON" => Self::Json,
            "BIT" => Self::Bit,
            other if other.contains("BLOB") || other.contains("BINARY") => Self::Bytes,
            other if other.contains("CHAR") || other.contains("TEXT") => Self::Text,
            _ => return None,
        };
        Some(kind)
    }
}

fn row_to_json(row: &MySqlRow) -> Value {
    let object = row
        .columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect();
    Value::Object(object)
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    if row.try_get_raw(index).map_or(true, |raw| raw.is_null()) {
        return Value::Null;
    }
    let Some(kind) = ColumnKind::classify(type_name) else {
        warn!(column = index, type_name, "unsupported column type, returning null");
        return Value::Null;
    };
    decode(row, index, kind).unwrap_or_else(|err| {
        warn!(column = index, type_name, error = %err, "failed to decode column, returning null");
        Value::Null
    })
}

fn decode(row: &MySqlRow, index: usize, kind: ColumnKind) -> Result<Value, sqlx::Error> {
    let value = match kind {
        ColumnKind::Bool => Value::Bool(row.try_get_unchecked::<bool, _>(index)?),
        ColumnKind::Signed => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        ColumnKind::Unsigned => Value::from(row.try_get_unchecked::<u64, _>(index)?),
        ColumnKind::Float => Value::from(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        ColumnKind::Double => Value::from(row.try_get_unchecked::<f64, _>(index)?),
        ColumnKind::Text => Value::String(row.try_get_unchecked::<String, _>(index)?),
        ColumnKind::Bytes => bytes_value(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        ColumnKind::Date => Value::String(
            row.try_get_unchecked::<NaiveDate, _>(index)?
                .format("%Y-%m-%d")
                .to_string(),
        ),
        ColumnKind::DateTime => Value::String(iso_timestamp(
            &row.try_get_unchecked::<NaiveDateTime, _>(index)?.and_utc(),
        )),
        ColumnKind::Timestamp => Value::String(iso_timestamp(
            &row.try_get_unchecked::<DateTime<Utc>, _>(index)?,
        )),
        ColumnKind::Time => Value::String(
            row.try_get_unchecked::<NaiveTime, _>(index)?
                .format("%H:%M:%S")
                .to_string(),
        ),
        ColumnKind::Json => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        ColumnKind::Bit => bit_value(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

/// Datetimes without a zone are read as UTC.
fn iso_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn bytes_value(bytes: Vec<u8>) -> Value {
    Value::Array(bytes.into_iter().map(Value::from).collect())
}

/// Single-byte bit values are flags.
fn bit_value(bytes: Vec<u8>) -> Value {
    match bytes.as_slice() {
        [flag] => Value::Bool(*flag != 0),
        _ => bytes_value(bytes),
    }
}

#[cfg(test)]
mod tests {
    use request_builder_core::GlobalSettings;
    use serde_json::json;

    use super::*;
    use crate::module::ResourceHandle;

    #[test]
    fn statement_expands_own_column_map() {
        let details = json!({
            "SQL": ["SELECT :COL_MAP", "FROM users WHERE id = :id"],
            "COL_MAP": {"user_id": "id", "full_name": "name"}
        });
        assert_eq!(
            prepare_statement(&details, None).unwrap(),
            "SELECT user_id as id, full_name as name FROM users WHERE id = :id"
        );
    }

    #[test]
    fn statement_falls_back_to_parent_column_map() {
        let details = json!({"SQL": "SELECT :COL_MAP FROM users"});
        let parent = json!({"COL_MAP": {"user_id": "id"}});
        assert_eq!(
            prepare_statement(&details, Some(&parent)).unwrap(),
            "SELECT user_id as id FROM users"
        );
    }

    #[test]
    fn statement_requires_sql() {
        let err = prepare_statement(&json!({"COL_MAP": {}}), None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn single_record_shapes() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];
        assert_eq!(shape_rows(rows.clone(), false, "q"), json!([{"id": 1}, {"id": 2}]));
        assert_eq!(shape_rows(rows, true, "q"), json!({}));
        assert_eq!(shape_rows(vec![json!({"id": 3})], true, "q"), json!({"id": 3}));
        assert_eq!(shape_rows(Vec::new(), true, "q"), json!({}));
        assert_eq!(shape_rows(Vec::new(), false, "q"), json!([]));
    }

    #[test]
    fn column_types_are_classified() {
        assert_eq!(ColumnKind::classify("INT"), Some(ColumnKind::Signed));
        assert_eq!(ColumnKind::classify("BIGINT UNSIGNED"), Some(ColumnKind::Unsigned));
        assert_eq!(ColumnKind::classify("BOOLEAN"), Some(ColumnKind::Bool));
        assert_eq!(ColumnKind::classify("DECIMAL"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::classify("VARCHAR"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::classify("MEDIUMTEXT"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::classify("VARBINARY"), Some(ColumnKind::Bytes));
        assert_eq!(ColumnKind::classify("LONGBLOB"), Some(ColumnKind::Bytes));
        assert_eq!(ColumnKind::classify("TIMESTAMP"), Some(ColumnKind::Timestamp));
        assert_eq!(ColumnKind::classify("BIT"), Some(ColumnKind::Bit));
        assert_eq!(ColumnKind::classify("GEOMETRY"), None);
    }

    #[test]
    fn bits_become_flags() {
        assert_eq!(bit_value(vec![1]), json!(true));
        assert_eq!(bit_value(vec![0]), json!(false));
        assert_eq!(bit_value(vec![1, 2]), json!([1, 2]));
    }

    #[test]
    fn timestamps_render_as_iso() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_milli_opt(8, 5, 1, 250))
            .unwrap()
            .and_utc();
        assert_eq!(iso_timestamp(&at), "2024-03-09T08:05:01.250Z");
    }

    #[tokio::test]
    async fn missing_sql_fails_without_connecting() {
        let module = MysqlModule::new(&MysqlConfig::default());
        let ctx = ModuleContext::new(Arc::new(GlobalSettings::default()), ResourceHandle::new());
        let call = module.async_fn(&json!({}), None, &ctx).unwrap();
        let err = call(RequestObject::new()).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidDefinition { .. }));

        // no pool was ever opened
        module.close_connections().await.unwrap();
        assert!(module.pool.pool.get().is_none());
    }
}
