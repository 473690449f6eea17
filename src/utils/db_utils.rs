use actix_web::error::ErrorBadRequest;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Build a partial `UPDATE` from a JSON object, binding only allow-listed
/// columns. `updated_at` is always bumped alongside the caller's fields.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: i64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed_columns.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Unknown column: {unknown}")));
    }

    let set_clause = obj
        .keys()
        .enumerate()
        .map(|(i, k)| format!("{} = ${}", k, i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {}, updated_at = NOW() WHERE {} = ${}",
        table,
        set_clause,
        id_column,
        obj.len() + 1
    );

    let mut values = Vec::with_capacity(obj.len() + 1);

    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    values.push(SqlValue::DateTime(dt.with_timezone(&Utc)));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
        }
    }

    values.push(SqlValue::I64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &PgPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["department", "full_name", "joining_date", "phone"];

    #[test]
    fn builds_numbered_placeholders_and_bumps_updated_at() {
        let payload = json!({ "department": "Engineering", "full_name": "Jane Doe" });
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 7).unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET department = $1, full_name = $2, updated_at = NOW() WHERE id = $3"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Engineering".into()),
                SqlValue::String("Jane Doe".into()),
                SqlValue::I64(7),
            ]
        );
    }

    #[test]
    fn date_strings_bind_as_dates() {
        let payload = json!({ "joining_date": "2024-03-01" });
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 1).unwrap();
        assert_eq!(
            update.values[0],
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[test]
    fn null_clears_a_column() {
        let payload = json!({ "phone": null });
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Null);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let payload = json!({ "password": "nope" });
        assert!(build_update_sql("employees", &payload, COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn empty_and_non_object_payloads_are_rejected() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), COLUMNS, "id", 1).is_err());
    }
}
