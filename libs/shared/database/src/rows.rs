//! Conversions between SQLite TEXT columns and domain value types.

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

use crate::schema::DT_FORMAT;

pub fn parse_uuid(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_dt(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(&value, DT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_time(idx: usize, value: String) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(&value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M"))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn fmt_dt(value: DateTime<Utc>) -> String {
    value.format(DT_FORMAT).to_string()
}

pub fn fmt_time(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}
