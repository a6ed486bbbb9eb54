use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::AppError;

/// Columns a post listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    PublishedAt,
    CreatedAt,
    UpdatedAt,
    ViewCount,
    Title,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::PublishedAt,
        SortField::CreatedAt,
        SortField::UpdatedAt,
        SortField::ViewCount,
        SortField::Title,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::PublishedAt => "published_at",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::ViewCount => "view_count",
            SortField::Title => "title",
        }
    }

    /// Strict lookup by wire name.
    pub fn from_name(name: &str) -> Result<Self, AppError> {
        SortField::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| AppError::UnsupportedSortField(name.to_string()))
    }

    /// Lenient lookup for query strings: anything outside the whitelist
    /// falls back to `published_at`.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name.trim()).unwrap_or(SortField::PublishedAt)
    }

    /// Only `published_at` may be NULL (drafts are never published).
    pub fn is_nullable(&self) -> bool {
        matches!(self, SortField::PublishedAt)
    }

    fn is_timestamp(&self) -> bool {
        matches!(
            self,
            SortField::PublishedAt | SortField::CreatedAt | SortField::UpdatedAt
        )
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` means descending.
    pub fn resolve(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Absent values go last ascending and first descending.
    pub fn nulls_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "NULLS LAST",
            SortOrder::Desc => "NULLS FIRST",
        }
    }
}

/// Typed value of a sort column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortValue {
    Timestamp(DateTime<Utc>),
    Integer(i64),
    Text(String),
    /// NULL column value (an unpublished post under `published_at`)
    Absent,
}

impl SortValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SortValue::Absent)
    }

    /// Ordering between two present values of the same kind.
    pub fn cmp_present(&self, other: &SortValue) -> Option<Ordering> {
        match (self, other) {
            (SortValue::Timestamp(a), SortValue::Timestamp(b)) => Some(a.cmp(b)),
            (SortValue::Integer(a), SortValue::Integer(b)) => Some(a.cmp(b)),
            (SortValue::Text(a), SortValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Canonical string form of a sort value.
///
/// Timestamps are RFC 3339 in UTC with exactly nine fractional digits, so the
/// text is fixed-width and sorts lexically in chronological order.
pub fn format(field: SortField, value: &SortValue) -> Result<String, AppError> {
    match (value, field) {
        (SortValue::Absent, f) if f.is_nullable() => Ok(String::new()),
        (SortValue::Timestamp(ts), f) if f.is_timestamp() => {
            Ok(ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
        }
        (SortValue::Integer(n), SortField::ViewCount) => Ok(n.to_string()),
        (SortValue::Text(s), SortField::Title) => Ok(s.clone()),
        (value, field) => Err(AppError::Internal(format!(
            "sort value {:?} does not fit field {}",
            value, field
        ))),
    }
}

/// Inverse of [`format`]. Unknown field names are rejected.
pub fn parse(field_name: &str, raw: &str) -> Result<SortValue, AppError> {
    let field = SortField::from_name(field_name)?;
    match field {
        SortField::PublishedAt | SortField::CreatedAt | SortField::UpdatedAt => {
            if raw.is_empty() {
                return Ok(SortValue::Absent);
            }
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| SortValue::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|_| {
                    AppError::InvalidCursor(format!("'{}' is not a valid {} value", raw, field))
                })
        }
        SortField::ViewCount => raw.parse::<i64>().map(SortValue::Integer).map_err(|_| {
            AppError::InvalidCursor(format!("'{}' is not a valid {} value", raw, field))
        }),
        SortField::Title => Ok(SortValue::Text(raw.to_string())),
    }
}
