//! SQL rendering of keyset pagination plans.
//!
//! The predicate pushed here must agree with `SeekPredicate::admits`, and the
//! ORDER BY must agree with `PagePlan::compare`. Both are checked in tests.

use inkpost_core::pagination::{SeekPredicate, SortField, SortOrder, SortValue};
use sqlx::{Postgres, QueryBuilder};

/// Column expression for a sort field on the `posts p` alias.
///
/// Titles compare bytewise so the database agrees with in-memory ordering.
pub fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::PublishedAt => "p.published_at",
        SortField::CreatedAt => "p.created_at",
        SortField::UpdatedAt => "p.updated_at",
        SortField::ViewCount => "p.view_count",
        SortField::Title => "p.title COLLATE \"C\"",
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &SortValue) {
    match value {
        SortValue::Timestamp(ts) => {
            qb.push_bind(*ts);
        }
        SortValue::Integer(n) => {
            qb.push_bind(*n);
        }
        SortValue::Text(s) => {
            qb.push_bind(s.clone());
        }
        SortValue::Absent => {
            qb.push("NULL");
        }
    }
}

/// Push "strictly after the cursor row" as one parenthesized boolean expression.
pub fn push_seek_predicate(qb: &mut QueryBuilder<'_, Postgres>, seek: &SeekPredicate) {
    let col = sort_column(seek.field);
    let cmp = match seek.order {
        SortOrder::Desc => " < ",
        SortOrder::Asc => " > ",
    };

    qb.push("(");
    match (&seek.value, seek.order) {
        (SortValue::Absent, SortOrder::Desc) => {
            qb.push("(")
                .push(col)
                .push(" IS NULL AND p.id")
                .push(cmp)
                .push_bind(seek.id)
                .push(") OR ")
                .push(col)
                .push(" IS NOT NULL");
        }
        (SortValue::Absent, SortOrder::Asc) => {
            qb.push(col)
                .push(" IS NULL AND p.id")
                .push(cmp)
                .push_bind(seek.id);
        }
        (value, order) => {
            qb.push(col).push(cmp);
            push_value(qb, value);
            qb.push(" OR (").push(col).push(" = ");
            push_value(qb, value);
            qb.push(" AND p.id").push(cmp).push_bind(seek.id).push(")");
            if order == SortOrder::Asc {
                qb.push(" OR ").push(col).push(" IS NULL");
            }
        }
    }
    qb.push(")");
}

/// `ORDER BY <col> <dir> NULLS <policy>, p.id <dir>`
pub fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, field: SortField, order: SortOrder) {
    qb.push(" ORDER BY ")
        .push(sort_column(field))
        .push(" ")
        .push(order.as_sql())
        .push(" ")
        .push(order.nulls_sql())
        .push(", p.id ")
        .push(order.as_sql());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn render(seek: &SeekPredicate) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("WHERE ");
        push_seek_predicate(&mut qb, seek);
        qb.sql().to_string()
    }

    fn seek(field: SortField, order: SortOrder, value: SortValue) -> SeekPredicate {
        SeekPredicate {
            field,
            order,
            value,
            id: 42,
        }
    }

    #[test]
    fn test_desc_present_value() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let sql = render(&seek(
            SortField::PublishedAt,
            SortOrder::Desc,
            SortValue::Timestamp(ts),
        ));
        assert_eq!(
            sql,
            "WHERE (p.published_at < $1 OR (p.published_at = $2 AND p.id < $3))"
        );
    }

    #[test]
    fn test_asc_present_value_admits_nulls() {
        let sql = render(&seek(
            SortField::PublishedAt,
            SortOrder::Asc,
            SortValue::Timestamp(Utc::now()),
        ));
        assert_eq!(
            sql,
            "WHERE (p.published_at > $1 OR (p.published_at = $2 AND p.id > $3) OR p.published_at IS NULL)"
        );
    }

    #[test]
    fn test_absent_value_forms() {
        assert_eq!(
            render(&seek(SortField::PublishedAt, SortOrder::Desc, SortValue::Absent)),
            "WHERE ((p.published_at IS NULL AND p.id < $1) OR p.published_at IS NOT NULL)"
        );
        assert_eq!(
            render(&seek(SortField::PublishedAt, SortOrder::Asc, SortValue::Absent)),
            "WHERE (p.published_at IS NULL AND p.id > $1)"
        );
    }

    #[test]
    fn test_title_uses_bytewise_collation() {
        let sql = render(&seek(
            SortField::Title,
            SortOrder::Desc,
            SortValue::Text("m".into()),
        ));
        assert!(sql.starts_with("WHERE (p.title COLLATE \"C\" < $1"));
    }

    #[test]
    fn test_order_by_has_id_tiebreak_and_null_policy() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts p");
        push_order_by(&mut qb, SortField::ViewCount, SortOrder::Asc);
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM posts p ORDER BY p.view_count ASC NULLS LAST, p.id ASC"
        );

        let mut qb = QueryBuilder::<Postgres>::new("");
        push_order_by(&mut qb, SortField::PublishedAt, SortOrder::Desc);
        assert_eq!(qb.sql(), " ORDER BY p.published_at DESC NULLS FIRST, p.id DESC");
    }
}
