use std::error::Error;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::Object;
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Row as PgRow, Statement};
use uuid::Uuid;

use super::params::Params;
use crate::error::PgUtilError;
use crate::pool::Queryable;
use crate::results::RowSet;
use crate::types::RowValues;

#[async_trait]
impl Queryable for Object {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<RowSet, PgUtilError> {
        let client: &Client = self;
        let stmt = client.prepare(sql).await?;
        let converted = Params::convert(params);
        let rows = client.query(&stmt, converted.as_refs()).await?;
        build_row_set(&stmt, &rows)
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), PgUtilError> {
        let client: &Client = self;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

/// Build a row set using statement metadata for column names, so empty results keep them.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_row_set(stmt: &Statement, rows: &[PgRow]) -> Result<RowSet, PgUtilError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut row_set = RowSet::with_columns(column_names, rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(extract_value(row, idx)?);
        }
        row_set.add_row_values(values);
    }
    Ok(row_set)
}

/// Extracts a `RowValues` from a `tokio_postgres` row at the given index.
///
/// Types without a dedicated variant keep their exact text form (`NUMERIC`, `DATE`,
/// `TIME`, `UUID`) or become a JSON array (one-dimensional arrays of scalars). Anything
/// else is returned as text when the wire bytes are UTF-8 and as a blob otherwise, so a
/// statement that ran never fails on an unfamiliar column type.
///
/// # Errors
/// Returns `PgUtilError::Postgres` if the column cannot be decoded as its reported type.
pub fn extract_value(row: &PgRow, idx: usize) -> Result<RowValues, PgUtilError> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::NUMERIC => row
            .try_get::<_, Option<NumericText>>(idx)?
            .map(|v| RowValues::Text(v.0)),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| RowValues::Text(v.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| RowValues::Text(v.to_string())),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|v| RowValues::Text(v.to_string())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text)
        }
        Type::INT2_ARRAY => json_array::<i16>(row, idx)?,
        Type::INT4_ARRAY => json_array::<i32>(row, idx)?,
        Type::INT8_ARRAY => json_array::<i64>(row, idx)?,
        Type::FLOAT4_ARRAY => json_array::<f32>(row, idx)?,
        Type::FLOAT8_ARRAY => json_array::<f64>(row, idx)?,
        Type::BOOL_ARRAY => json_array::<bool>(row, idx)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => json_array::<String>(row, idx)?,
        _ => row.try_get::<_, Option<RawValue>>(idx)?.map(|raw| {
            match String::from_utf8(raw.0) {
                Ok(text) => RowValues::Text(text),
                Err(err) => RowValues::Blob(err.into_bytes()),
            }
        }),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

fn json_array<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<RowValues>, PgUtilError>
where
    T: FromSql<'r> + Into<Value>,
{
    Ok(row
        .try_get::<_, Option<Vec<Option<T>>>>(idx)?
        .map(|items| RowValues::JSON(Value::from(items))))
}

/// `NUMERIC` rendered exactly as the server would print it.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        decode_numeric(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Wire bytes of a column whose type has no dedicated decoding.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

// Binary NUMERIC: ndigits, weight, sign, dscale, then base-10000 digits, all big-endian.
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    let ndigits = usize::from(read_u16(raw, 0)?);
    let weight = i32::from(i16::from_be_bytes(read_u16(raw, 2)?.to_be_bytes()));
    let sign = read_u16(raw, 4)?;
    let dscale = usize::from(read_u16(raw, 6)?);

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let mut digits = Vec::with_capacity(ndigits);
    for i in 0..ndigits {
        digits.push(read_u16(raw, 8 + 2 * i)?);
    }
    let digit = |pos: i32| -> u16 {
        usize::try_from(pos)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for pos in 1..=weight {
            out.push_str(&format!("{:04}", digit(pos)));
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(pos)));
            pos += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

fn read_u16(raw: &[u8], offset: usize) -> Result<u16, Box<dyn Error + Sync + Send>> {
    raw.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated NUMERIC value".into())
}
