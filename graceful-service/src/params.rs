//! Typed request parameter helpers
//!
//! These operate on the string maps produced by axum's
//! `Path<HashMap<String, String>>` and `Query<HashMap<String, String>>`
//! extractors. An absent parameter and an empty one are treated the same.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use graceful_service::params::{int64_query, pagination};
//!
//! let query = HashMap::from([
//!     ("page".to_string(), "2".to_string()),
//!     ("limit".to_string(), "7".to_string()),
//! ]);
//!
//! assert_eq!(int64_query(&query, "limit", Some(10), 5).unwrap(), 7);
//!
//! let page = pagination(&query, 100, 20).unwrap();
//! assert_eq!(page.page, 2);
//! assert_eq!(page.page_size, 20);
//! assert_eq!(page.offset(), 40);
//! ```

use std::collections::HashMap;
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Query key holding the zero-based page number
pub const PAGE_KEY: &str = "page";

/// Query key holding the page size
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// Invalid or missing request parameter
#[derive(Debug, Error)]
pub enum ParamError {
    /// Value is not a base-10 signed 64-bit integer
    #[error("failed to parse int64 param \"{key}\" value \"{value}\": {source}")]
    InvalidInt {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// Value exceeds the allowed maximum
    #[error("param \"{key}\" too large, must be less than {max}")]
    TooLarge { key: String, max: i64 },

    /// Required parameter is absent or empty
    #[error("param \"{key}\" is required")]
    Required { key: String },

    /// Value is not a UUID
    #[error("failed to parse uuid param \"{key}\" value \"{value}\": {source}")]
    InvalidUuid {
        key: String,
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("page must be greater than or equal to 0")]
    NegativePage,

    #[error("pageSize must be greater than 0")]
    NonPositivePageSize,
}

impl ParamError {
    /// Name of the offending parameter
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidInt { key, .. }
            | Self::TooLarge { key, .. }
            | Self::Required { key }
            | Self::InvalidUuid { key, .. } => key,
            Self::NegativePage => PAGE_KEY,
            Self::NonPositivePageSize => PAGE_SIZE_KEY,
        }
    }
}

fn lookup<'a>(values: &'a HashMap<String, String>, key: &str) -> &'a str {
    values.get(key).map(String::as_str).unwrap_or_default()
}

/// Parse an optional int64 value
///
/// An empty `value` yields `default`. `max` of `None` leaves the value
/// unbounded.
pub fn parse_int64(value: &str, key: &str, max: Option<i64>, default: i64) -> Result<i64, ParamError> {
    if value.is_empty() {
        return Ok(default);
    }

    let parsed: i64 = value.parse().map_err(|source| ParamError::InvalidInt {
        key: key.to_string(),
        value: value.to_string(),
        source,
    })?;

    match max {
        Some(max) if parsed > max => Err(ParamError::TooLarge {
            key: key.to_string(),
            max,
        }),
        _ => Ok(parsed),
    }
}

/// Read an int64 path parameter, falling back to `default` when unset
pub fn int64_param(
    params: &HashMap<String, String>,
    key: &str,
    max: Option<i64>,
    default: i64,
) -> Result<i64, ParamError> {
    parse_int64(lookup(params, key), key, max, default)
}

/// Read an int64 query parameter, falling back to `default` when unset
pub fn int64_query(
    query: &HashMap<String, String>,
    key: &str,
    max: Option<i64>,
    default: i64,
) -> Result<i64, ParamError> {
    parse_int64(lookup(query, key), key, max, default)
}

/// Read a required UUID path parameter
pub fn uuid_param(params: &HashMap<String, String>, key: &str) -> Result<Uuid, ParamError> {
    let value = lookup(params, key);
    if value.is_empty() {
        return Err(ParamError::Required {
            key: key.to_string(),
        });
    }

    Uuid::parse_str(value).map_err(|source| ParamError::InvalidUuid {
        key: key.to_string(),
        value: value.to_string(),
        source,
    })
}

/// Page selection read from the `page` and `pageSize` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Zero-based page number
    pub page: i64,

    /// Number of items per page, always positive
    pub page_size: i64,
}

impl Pagination {
    /// Number of items to skip before this page
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.page_size)
    }

    /// Alias for the page size, for query builders that speak in limits
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// Read `page` and `pageSize` from a query map
///
/// `page` defaults to 0 and must not be negative. `pageSize` defaults to
/// `default_page_size`, may not exceed `max_page_size` and must be positive.
pub fn pagination(
    query: &HashMap<String, String>,
    max_page_size: i64,
    default_page_size: i64,
) -> Result<Pagination, ParamError> {
    let page = int64_query(query, PAGE_KEY, None, 0)?;
    if page < 0 {
        return Err(ParamError::NegativePage);
    }

    let page_size = int64_query(query, PAGE_SIZE_KEY, Some(max_page_size), default_page_size)?;
    if page_size <= 0 {
        return Err(ParamError::NonPositivePageSize);
    }

    Ok(Pagination { page, page_size })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_int64_defaults_when_absent_or_empty() {
        let params = map(&[("id", "")]);
        assert_eq!(int64_param(&params, "id", Some(10), 3).unwrap(), 3);
        assert_eq!(int64_param(&params, "missing", None, -1).unwrap(), -1);
    }

    #[test]
    fn test_int64_parses_value() {
        let params = map(&[("id", "42"), ("neg", "-7")]);
        assert_eq!(int64_param(&params, "id", None, 0).unwrap(), 42);
        assert_eq!(int64_query(&params, "neg", Some(0), 0).unwrap(), -7);
    }

    #[test]
    fn test_int64_respects_max() {
        let query = map(&[("limit", "11")]);
        let err = int64_query(&query, "limit", Some(10), 5).unwrap_err();
        assert!(matches!(err, ParamError::TooLarge { max: 10, .. }));
        assert_eq!(err.to_string(), "param \"limit\" too large, must be less than 10");

        let query = map(&[("limit", "10")]);
        assert_eq!(int64_query(&query, "limit", Some(10), 5).unwrap(), 10);
    }

    #[test]
    fn test_int64_rejects_garbage() {
        let query = map(&[("limit", "ten")]);
        let err = int64_query(&query, "limit", None, 5).unwrap_err();
        assert_eq!(err.key(), "limit");
        assert!(err
            .to_string()
            .starts_with("failed to parse int64 param \"limit\" value \"ten\""));

        let overflow = map(&[("limit", "9223372036854775808")]);
        assert!(matches!(
            int64_query(&overflow, "limit", None, 5),
            Err(ParamError::InvalidInt { .. })
        ));
    }

    #[test]
    fn test_uuid_param() {
        let id = Uuid::new_v4();
        let raw = id.to_string();
        let params = map(&[("id", raw.as_str())]);
        assert_eq!(uuid_param(&params, "id").unwrap(), id);
    }

    #[test]
    fn test_uuid_param_required() {
        let err = uuid_param(&map(&[]), "id").unwrap_err();
        assert_eq!(err.to_string(), "param \"id\" is required");

        let err = uuid_param(&map(&[("id", "")]), "id").unwrap_err();
        assert!(matches!(err, ParamError::Required { .. }));
    }

    #[test]
    fn test_uuid_param_invalid() {
        let err = uuid_param(&map(&[("id", "not-a-uuid")]), "id").unwrap_err();
        assert!(matches!(err, ParamError::InvalidUuid { .. }));
        assert!(err
            .to_string()
            .starts_with("failed to parse uuid param \"id\" value \"not-a-uuid\""));
    }

    #[test]
    fn test_pagination_defaults() {
        let page = pagination(&map(&[]), 100, 25).unwrap();
        assert_eq!(page, Pagination { page: 0, page_size: 25 });
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), 25);
    }

    #[test]
    fn test_pagination_reads_query() {
        let page = pagination(&map(&[("page", "3"), ("pageSize", "10")]), 100, 25).unwrap();
        assert_eq!(page, Pagination { page: 3, page_size: 10 });
        assert_eq!(page.offset(), 30);
    }

    #[test]
    fn test_pagination_rejects_negative_page() {
        let err = pagination(&map(&[("page", "-1")]), 100, 25).unwrap_err();
        assert!(matches!(err, ParamError::NegativePage));
        assert_eq!(err.key(), "page");
    }

    #[test]
    fn test_pagination_rejects_bad_page_size() {
        let err = pagination(&map(&[("pageSize", "0")]), 100, 25).unwrap_err();
        assert!(matches!(err, ParamError::NonPositivePageSize));

        let err = pagination(&map(&[("pageSize", "101")]), 100, 25).unwrap_err();
        assert!(matches!(err, ParamError::TooLarge { max: 100, .. }));

        let err = pagination(&map(&[]), 100, 0).unwrap_err();
        assert!(matches!(err, ParamError::NonPositivePageSize));
    }

    #[test]
    fn test_offset_saturates() {
        let page = Pagination {
            page: i64::MAX,
            page_size: 2,
        };
        assert_eq!(page.offset(), i64::MAX);
    }
}
