use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::cursor::{self, CursorData};
use super::sort::{self, SortField, SortOrder, SortValue};
use crate::error::AppError;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Row filters for a post listing. All are conjunctive; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub status: Option<String>,
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
}

/// Fingerprint of the listing a cursor belongs to: direction plus filters.
/// The sort field travels in the clear next to it.
pub fn cursor_scope(order: SortOrder, filters: &Filters) -> String {
    fn part(value: &Option<String>) -> String {
        match value {
            Some(v) => format!("+{}", v),
            None => "-".to_string(),
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(order.as_sql());
    for filter in [&filters.status, &filters.category_slug, &filters.tag_slug] {
        hasher.update([0x1fu8]);
        hasher.update(part(filter));
    }
    hex::encode(&hasher.finalize()[..8])
}

/// A row that can be positioned in a seek-paginated listing.
pub trait Seekable {
    fn seek_id(&self) -> i64;
    fn sort_value(&self, field: SortField) -> SortValue;
}

/// "Strictly after `(value, id)` in iteration order".
///
/// Descending: `(f < v) OR (f = v AND id < cid)`; ascending inverts both
/// comparisons. Absent values sort first descending and last ascending, which
/// extends the predicate as follows:
///
/// | order | cursor value | rows admitted                                  |
/// |-------|--------------|------------------------------------------------|
/// | desc  | present `v`  | `f < v OR (f = v AND id < cid)`                |
/// | desc  | absent       | `(f IS NULL AND id < cid) OR f IS NOT NULL`    |
/// | asc   | present `v`  | `f > v OR (f = v AND id > cid) OR f IS NULL`   |
/// | asc   | absent       | `f IS NULL AND id > cid`                       |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekPredicate {
    pub field: SortField,
    pub order: SortOrder,
    pub value: SortValue,
    pub id: i64,
}

impl SeekPredicate {
    /// In-memory evaluation of the predicate; the SQL rendering in the
    /// repository layer must agree with this.
    pub fn admits<T: Seekable>(&self, row: &T) -> bool {
        let row_value = row.sort_value(self.field);
        let row_id = row.seek_id();
        let id_after = match self.order {
            SortOrder::Desc => row_id < self.id,
            SortOrder::Asc => row_id > self.id,
        };

        match (&self.value, row_value.is_absent(), self.order) {
            (SortValue::Absent, true, _) => id_after,
            (SortValue::Absent, false, SortOrder::Desc) => true,
            (SortValue::Absent, false, SortOrder::Asc) => false,
            (_, true, SortOrder::Desc) => false,
            (_, true, SortOrder::Asc) => true,
            (cursor_value, false, order) => match row_value.cmp_present(cursor_value) {
                Some(Ordering::Equal) => id_after,
                Some(Ordering::Less) => order == SortOrder::Desc,
                Some(Ordering::Greater) => order == SortOrder::Asc,
                None => false,
            },
        }
    }
}

/// Everything the repository needs to fetch one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    pub filters: Filters,
    pub sort_field: SortField,
    pub order: SortOrder,
    pub seek: Option<SeekPredicate>,
    /// Rows returned to the client
    pub limit: i64,
    /// Rows requested from the datastore (`limit + 1`, the extra row is the has-more probe)
    pub fetch_limit: i64,
}

impl PagePlan {
    /// Total order used for the listing: sort column, then id, same direction.
    pub fn compare<T: Seekable>(&self, a: &T, b: &T) -> Ordering {
        let (va, vb) = (a.sort_value(self.sort_field), b.sort_value(self.sort_field));
        let primary = match (va.is_absent(), vb.is_absent()) {
            (true, true) => Ordering::Equal,
            // absent is "largest": last ascending, first descending
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => va.cmp_present(&vb).unwrap_or(Ordering::Equal),
        };
        let ord = primary.then_with(|| a.seek_id().cmp(&b.seek_id()));
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Build the fetch plan for one page.
///
/// `sort_field` and `order` are resolved leniently (unknown values fall back to
/// `published_at` / `desc`). A cursor minted under a different sort field,
/// direction or filter set is rejected rather than reinterpreted.
pub fn plan(
    filters: Filters,
    sort_field: &str,
    order: &str,
    cursor_token: &str,
    limit: Option<i64>,
) -> Result<PagePlan, AppError> {
    let sort_field = SortField::resolve(sort_field);
    let order = SortOrder::resolve(order);
    let limit = match limit {
        Some(n) if n > 0 => n.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    };

    let seek = match cursor::decode(cursor_token)? {
        None => None,
        Some(c) => {
            if c.sort_field != sort_field.as_str() {
                return Err(AppError::CursorMismatch {
                    expected: sort_field.as_str().to_string(),
                    found: c.sort_field,
                });
            }
            let scope = cursor_scope(order, &filters);
            if c.scope != scope {
                return Err(AppError::CursorMismatch {
                    expected: format!("{}:{}", sort_field, scope),
                    found: format!("{}:{}", c.sort_field, c.scope),
                });
            }
            let value = sort::parse(&c.sort_field, &c.sort_value)?;
            Some(SeekPredicate {
                field: sort_field,
                order,
                value,
                id: c.id,
            })
        }
    };

    Ok(PagePlan {
        filters,
        sort_field,
        order,
        seek,
        limit,
        fetch_limit: limit + 1,
    })
}

/// One page of results in the client wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
    /// Backward pagination is not supported; always `null`.
    pub prev_cursor: Option<String>,
    pub has_more: bool,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            prev_cursor: None,
            has_more: self.has_more,
            limit: self.limit,
        }
    }
}

/// Trim the probe row and mint the next cursor from the last kept row.
pub fn finish_page<T: Seekable>(mut rows: Vec<T>, plan: &PagePlan) -> Result<Page<T>, AppError> {
    let limit = usize::try_from(plan.limit).unwrap_or(usize::MAX);
    let has_more = rows.len() > limit;
    if has_more {
        rows.truncate(limit);
    }

    let next_cursor = match rows.last() {
        Some(last) if has_more => {
            let value = last.sort_value(plan.sort_field);
            Some(cursor::encode(&CursorData {
                sort_field: plan.sort_field.as_str().to_string(),
                scope: cursor_scope(plan.order, &plan.filters),
                sort_value: sort::format(plan.sort_field, &value)?,
                id: last.seek_id(),
            }))
        }
        _ => None,
    };

    Ok(Page {
        data: rows,
        next_cursor,
        prev_cursor: None,
        has_more,
        limit: plan.limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        published_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        views: i64,
        title: String,
    }

    impl Seekable for Row {
        fn seek_id(&self) -> i64 {
            self.id
        }

        fn sort_value(&self, field: SortField) -> SortValue {
            match field {
                SortField::PublishedAt => self
                    .published_at
                    .map(SortValue::Timestamp)
                    .unwrap_or(SortValue::Absent),
                SortField::CreatedAt | SortField::UpdatedAt => {
                    SortValue::Timestamp(self.created_at)
                }
                SortField::ViewCount => SortValue::Integer(self.views),
                SortField::Title => SortValue::Text(self.title.clone()),
            }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn row(id: i64, published: Option<i64>, views: i64) -> Row {
        Row {
            id,
            published_at: published.map(at),
            created_at: at(1_000),
            views,
            title: format!("post {}", id),
        }
    }

    /// Stand-in for the datastore: filter by the seek predicate, order, take fetch_limit.
    fn fetch(table: &[Row], plan: &PagePlan) -> Vec<Row> {
        let mut rows: Vec<Row> = table
            .iter()
            .filter(|r| plan.seek.as_ref().map_or(true, |s| s.admits(*r)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| plan.compare(a, b));
        rows.truncate(plan.fetch_limit as usize);
        rows
    }

    fn paginate_all(table: &[Row], sort_field: &str, order: &str, limit: i64) -> Vec<Vec<i64>> {
        let mut pages = Vec::new();
        let mut token = String::new();
        loop {
            let plan = plan(Filters::default(), sort_field, order, &token, Some(limit)).unwrap();
            let page = finish_page(fetch(table, &plan), &plan).unwrap();
            pages.push(page.data.iter().map(|r| r.id).collect());
            match page.next_cursor {
                Some(next) => token = next,
                None => return pages,
            }
        }
    }

    #[test]
    fn test_duplicate_sort_values_paginate_exactly_once() {
        let table: Vec<Row> = (1..=7).map(|id| row(id, Some(5_000), 10)).collect();

        let desc = paginate_all(&table, "published_at", "desc", 3);
        assert_eq!(desc, vec![vec![7, 6, 5], vec![4, 3, 2], vec![1]]);

        let asc = paginate_all(&table, "view_count", "asc", 2);
        assert_eq!(asc, vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7]]);
    }

    #[test]
    fn test_mixed_values_visit_every_row_once() {
        let table = vec![
            row(1, Some(300), 5),
            row(2, Some(100), 5),
            row(3, None, 9),
            row(4, Some(300), 1),
            row(5, None, 9),
            row(6, Some(200), 5),
        ];
        for order in ["asc", "desc"] {
            for field in ["published_at", "view_count", "title"] {
                let pages = paginate_all(&table, field, order, 2);
                let mut seen: Vec<i64> = pages.into_iter().flatten().collect();
                assert_eq!(seen.len(), table.len(), "{} {}", field, order);
                seen.sort_unstable();
                assert_eq!(seen, vec![1, 2, 3, 4, 5, 6], "{} {}", field, order);
            }
        }
    }

    #[test]
    fn test_absent_values_first_descending_last_ascending() {
        let table = vec![row(1, Some(100), 0), row(2, None, 0), row(3, Some(200), 0), row(4, None, 0)];

        let desc: Vec<i64> = paginate_all(&table, "published_at", "desc", 1)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(desc, vec![4, 2, 3, 1]);

        let asc: Vec<i64> = paginate_all(&table, "published_at", "asc", 1)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(asc, vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_has_more_when_exactly_limit_rows_remain() {
        let table: Vec<Row> = (1..=4).map(|id| row(id, Some(id * 10), 0)).collect();
        let plan = plan(Filters::default(), "published_at", "desc", "", Some(4)).unwrap();
        assert_eq!(plan.fetch_limit, 5);
        let page = finish_page(fetch(&table, &plan), &plan).unwrap();
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.data.len(), 4);
    }

    #[test]
    fn test_has_more_with_limit_plus_one_rows_and_replay_returns_rest() {
        let table: Vec<Row> = (1..=5).map(|id| row(id, Some(id * 10), 0)).collect();
        let first = plan(Filters::default(), "published_at", "desc", "", Some(4)).unwrap();
        let page = finish_page(fetch(&table, &first), &first).unwrap();
        assert!(page.has_more);
        assert_eq!(page.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 4, 3, 2]);

        let token = page.next_cursor.expect("next cursor");
        let second = plan(Filters::default(), "published_at", "desc", &token, Some(4)).unwrap();
        let rest = finish_page(fetch(&table, &second), &second).unwrap();
        assert_eq!(rest.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
        assert!(!rest.has_more);
    }

    #[test]
    fn test_cursor_for_other_field_is_rejected() {
        let token = cursor::encode(&CursorData {
            sort_field: "created_at".to_string(),
            scope: cursor_scope(SortOrder::Asc, &Filters::default()),
            sort_value: "2024-01-01T00:00:00.000000000Z".to_string(),
            id: 3,
        });
        let err = plan(Filters::default(), "title", "asc", &token, None).unwrap_err();
        match err {
            AppError::CursorMismatch { expected, found } => {
                assert_eq!(expected, "title");
                assert_eq!(found, "created_at");
            }
            other => panic!("expected CursorMismatch, got {:?}", other),
        }
    }

    fn first_cursor(filters: Filters, sort_field: &str, order: &str) -> String {
        let table: Vec<Row> = (1..=5).map(|id| row(id, Some(id * 10), id)).collect();
        let plan = plan(filters, sort_field, order, "", Some(2)).unwrap();
        finish_page(fetch(&table, &plan), &plan)
            .unwrap()
            .next_cursor
            .expect("next cursor")
    }

    #[test]
    fn test_cursor_replayed_under_flipped_direction_is_rejected() {
        let token = first_cursor(Filters::default(), "view_count", "desc");

        let err = plan(Filters::default(), "view_count", "asc", &token, None).unwrap_err();
        assert!(matches!(err, AppError::CursorMismatch { .. }));

        // same listing still accepts it, order spelled differently
        assert!(plan(Filters::default(), "view_count", "DESC", &token, None).is_ok());
    }

    #[test]
    fn test_cursor_replayed_under_other_filters_is_rejected() {
        let published = Filters {
            status: Some("published".to_string()),
            ..Filters::default()
        };
        let token = first_cursor(published.clone(), "published_at", "desc");

        let draft = Filters {
            status: Some("draft".to_string()),
            ..Filters::default()
        };
        let tagged = Filters {
            tag_slug: Some("rust".to_string()),
            ..published.clone()
        };
        for other in [Filters::default(), draft, tagged] {
            let err = plan(other.clone(), "published_at", "desc", &token, None).unwrap_err();
            assert!(
                matches!(err, AppError::CursorMismatch { .. }),
                "accepted under {:?}",
                other
            );
        }
        assert!(plan(published, "published_at", "desc", &token, None).is_ok());
    }

    #[test]
    fn test_scope_distinguishes_absent_and_empty_filters() {
        let empty_tag = Filters {
            tag_slug: Some(String::new()),
            ..Filters::default()
        };
        assert_ne!(
            cursor_scope(SortOrder::Desc, &Filters::default()),
            cursor_scope(SortOrder::Desc, &empty_tag)
        );
        assert_ne!(
            cursor_scope(SortOrder::Desc, &Filters::default()),
            cursor_scope(SortOrder::Asc, &Filters::default())
        );
    }

    #[test]
    fn test_invalid_cursor_propagates() {
        let err = plan(Filters::default(), "title", "asc", "%%%", None).unwrap_err();
        assert!(matches!(err, AppError::InvalidCursor(_)));
    }

    #[test]
    fn test_unknown_sort_field_falls_back_and_checks_cursor_against_fallback() {
        let plan_a = plan(Filters::default(), "popularity", "up", "", None).unwrap();
        assert_eq!(plan_a.sort_field, SortField::PublishedAt);
        assert_eq!(plan_a.order, SortOrder::Desc);
        assert_eq!(plan_a.limit, DEFAULT_LIMIT);

        let token = cursor::encode(&CursorData {
            sort_field: "published_at".to_string(),
            scope: cursor_scope(SortOrder::Desc, &Filters::default()),
            sort_value: String::new(),
            id: 9,
        });
        let plan_b = plan(Filters::default(), "popularity", "desc", &token, None).unwrap();
        let seek = plan_b.seek.expect("seek predicate");
        assert_eq!(seek.value, SortValue::Absent);
        assert_eq!(seek.id, 9);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(plan(Filters::default(), "", "", "", Some(0)).unwrap().limit, DEFAULT_LIMIT);
        assert_eq!(plan(Filters::default(), "", "", "", Some(-5)).unwrap().limit, DEFAULT_LIMIT);
        assert_eq!(plan(Filters::default(), "", "", "", Some(10_000)).unwrap().limit, MAX_LIMIT);
    }

    #[test]
    fn test_page_serializes_wire_format() {
        let page = Page {
            data: vec![1, 2],
            next_cursor: Some("abc".to_string()),
            prev_cursor: None,
            has_more: true,
            limit: 2,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["next_cursor"], "abc");
        assert!(json["prev_cursor"].is_null());
        assert_eq!(json["has_more"], true);
        assert_eq!(json["limit"], 2);
    }
}
