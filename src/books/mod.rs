//! Book domain model
//!
//! Books are a projection of remote datasheet records: the gateway owns no
//! storage of its own. The wire contract (field names and the Chinese
//! status values) is fixed by the frontend the original system served, so
//! it is preserved verbatim here.

pub mod service;

pub use service::{BookService, ServiceError, ServiceResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::store::Record;

/// Datasheet field holding the book title.
pub const FIELD_NAME: &str = "book_name";
/// Datasheet field holding the lending status.
pub const FIELD_STATUS: &str = "book_status";
/// Datasheet field holding the shelf location.
pub const FIELD_LOCATION: &str = "book_location";

/// Lending status of a book.
///
/// Serialized with the store's Chinese wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookStatus {
    /// The book is currently borrowed.
    #[serde(rename = "已被借走")]
    Borrowed,
    /// The book is on the shelf.
    #[serde(rename = "未被借走")]
    Available,
}

impl BookStatus {
    /// Parse a wire value, returning `None` for anything outside the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "已被借走" => Some(BookStatus::Borrowed),
            "未被借走" => Some(BookStatus::Available),
            _ => None,
        }
    }

    /// The wire value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Borrowed => "已被借走",
            BookStatus::Available => "未被借走",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A book as exposed by the gateway's API.
///
/// `extra` carries any store-specific fields beyond the three the gateway
/// names, flattened into the JSON object so list responses expose the full
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned record id.
    pub id: String,
    pub book_name: String,
    pub book_status: BookStatus,
    pub book_location: String,
    #[serde(flatten, skip_serializing_if = "Map::is_empty", default)]
    pub extra: Map<String, Value>,
}

impl Book {
    /// Project a store record into a book.
    ///
    /// Fails when the record lacks a usable status value; the store is the
    /// source of truth and a record without a valid status is malformed.
    pub fn from_record(record: Record) -> Result<Self, String> {
        let Record { record_id, fields } = record;

        let mut extra = Map::new();
        let mut book_name = String::new();
        let mut book_location = String::new();
        let mut status: Option<BookStatus> = None;

        for (key, value) in fields {
            match key.as_str() {
                FIELD_NAME => {
                    book_name = value.as_str().unwrap_or_default().to_string();
                }
                FIELD_LOCATION => {
                    book_location = value.as_str().unwrap_or_default().to_string();
                }
                FIELD_STATUS => {
                    status = value.as_str().and_then(BookStatus::parse);
                    if status.is_none() {
                        return Err(format!(
                            "record {record_id} carries an invalid book_status: {value}"
                        ));
                    }
                }
                _ => {
                    extra.insert(key, value);
                }
            }
        }

        let book_status = status
            .ok_or_else(|| format!("record {record_id} is missing book_status"))?;

        Ok(Self {
            id: record_id,
            book_name,
            book_status,
            book_location,
            extra,
        })
    }
}

/// Validated input for creating or fully updating a book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub book_name: String,
    pub book_status: BookStatus,
    pub book_location: String,
}

impl BookFields {
    /// The datasheet field map for this input.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_NAME.to_string(), Value::String(self.book_name));
        fields.insert(
            FIELD_STATUS.to_string(),
            Value::String(self.book_status.as_str().to_string()),
        );
        fields.insert(FIELD_LOCATION.to_string(), Value::String(self.book_location));
        fields
    }
}

/// Validation messages, part of the stable client contract.
pub mod messages {
    pub const EMPTY_BODY: &str = "请求体不能为空";
    pub const MISSING_FIELDS: &str = "所有字段都是必填的";
    pub const NON_STRING_FIELDS: &str = "所有字段必须为字符串类型";
    pub const INVALID_STATUS: &str = "图书状态必须是 \"已被借走\" 或 \"未被借走\"";
    pub const INVALID_STATUS_VALUE: &str = "无效的状态值，必须是 \"已被借走\" 或 \"未被借走\"";
    pub const EMPTY_ID: &str = "图书ID不能为空";
    pub const NOT_FOUND: &str = "找不到指定的图书";
    pub const RATE_LIMITED: &str = "服务器繁忙，请稍后重试";
    pub const INTERNAL: &str = "服务器内部错误";
    pub const DELETED: &str = "图书删除成功";
}

/// Validate a create/full-update request body.
///
/// Field presence and typing are checked before any remote call, so invalid
/// input never consumes retry budget.
pub fn validate_book_fields(body: &Value) -> Result<BookFields, String> {
    let object = body.as_object().ok_or(messages::EMPTY_BODY)?;

    let name = object.get(FIELD_NAME).filter(|v| !v.is_null());
    let status = object.get(FIELD_STATUS).filter(|v| !v.is_null());
    let location = object.get(FIELD_LOCATION).filter(|v| !v.is_null());

    let (name, status, location) = match (name, status, location) {
        (Some(n), Some(s), Some(l)) => (n, s, l),
        _ => return Err(messages::MISSING_FIELDS.to_string()),
    };

    let (name, status, location) = match (name.as_str(), status.as_str(), location.as_str()) {
        (Some(n), Some(s), Some(l)) if !n.is_empty() && !s.is_empty() && !l.is_empty() => {
            (n, s, l)
        }
        (Some(_), Some(_), Some(_)) => return Err(messages::MISSING_FIELDS.to_string()),
        _ => return Err(messages::NON_STRING_FIELDS.to_string()),
    };

    let book_status = BookStatus::parse(status).ok_or(messages::INVALID_STATUS)?;

    Ok(BookFields {
        book_name: name.to_string(),
        book_status,
        book_location: location.to_string(),
    })
}

/// Validate a status-patch request body (`{"status": ...}`).
pub fn validate_status(body: &Value) -> Result<BookStatus, String> {
    body.as_object()
        .and_then(|o| o.get("status"))
        .and_then(Value::as_str)
        .and_then(BookStatus::parse)
        .ok_or_else(|| messages::INVALID_STATUS_VALUE.to_string())
}
