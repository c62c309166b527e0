use crate::domain::rating::RatingEvent;
use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RatingFilter {
    #[default]
    All,
    /// Exact brokerage name.
    Brokerage(String),
    /// Case-insensitive substring of the ticker.
    TickerContains(String),
    /// Exact match on either the previous or the new rating.
    Rating(String),
}

impl RatingFilter {
    pub fn matches(&self, event: &RatingEvent) -> bool {
        match self {
            RatingFilter::All => true,
            RatingFilter::Brokerage(b) => event.brokerage == *b,
            RatingFilter::TickerContains(t) => event
                .ticker
                .to_lowercase()
                .contains(&t.to_lowercase()),
            RatingFilter::Rating(r) => event.rating_from == *r || event.rating_to == *r,
        }
    }

    /// Appends the `WHERE` clause shared by listing and counting.
    pub(crate) fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            RatingFilter::All => {}
            RatingFilter::Brokerage(b) => {
                qb.push(" WHERE brokerage = ").push_bind(b.clone());
            }
            RatingFilter::TickerContains(t) => {
                qb.push(" WHERE ticker ILIKE ").push_bind(like_pattern(t));
            }
            RatingFilter::Rating(r) => {
                qb.push(" WHERE (rating_from = ")
                    .push_bind(r.clone())
                    .push(" OR rating_to = ")
                    .push_bind(r.clone())
                    .push(")");
            }
        }
    }
}

/// Sortable columns. Request text never reaches SQL; unknown names fall back to `Time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Ticker,
    Company,
    Brokerage,
    RatingFrom,
    RatingTo,
    #[default]
    Time,
}

impl SortField {
    pub fn from_param(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ticker" => SortField::Ticker,
            "company" => SortField::Company,
            "brokerage" => SortField::Brokerage,
            "rating_from" => SortField::RatingFrom,
            "rating_to" => SortField::RatingTo,
            _ => SortField::Time,
        }
    }

    /// `ORDER BY` expression. Text columns sort byte-wise (`COLLATE "C"`), matching `compare`.
    pub fn order_expr(self) -> &'static str {
        match self {
            SortField::Ticker => r#"ticker COLLATE "C""#,
            SortField::Company => r#"company COLLATE "C""#,
            SortField::Brokerage => r#"brokerage COLLATE "C""#,
            SortField::RatingFrom => r#"rating_from COLLATE "C""#,
            SortField::RatingTo => r#"rating_to COLLATE "C""#,
            SortField::Time => "time",
        }
    }

    fn compare(self, a: &RatingEvent, b: &RatingEvent) -> Ordering {
        match self {
            SortField::Ticker => a.ticker.cmp(&b.ticker),
            SortField::Company => a.company.cmp(&b.company),
            SortField::Brokerage => a.brokerage.cmp(&b.brokerage),
            SortField::RatingFrom => a.rating_from.cmp(&b.rating_from),
            SortField::RatingTo => a.rating_to.cmp(&b.rating_to),
            SortField::Time => a.time.cmp(&b.time),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_param(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: RatingFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub offset: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: RatingFilter::All,
            sort: SortField::Time,
            order: SortOrder::Desc,
            offset: 0,
            limit: 10,
        }
    }
}

impl ListQuery {
    /// Ordering used by both stores: requested column, then ticker ascending for stable pages.
    pub fn compare(&self, a: &RatingEvent, b: &RatingEvent) -> Ordering {
        let primary = self.sort.compare(a, b);
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.ticker.cmp(&b.ticker))
    }

    pub(crate) fn push_order_and_page(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ")
            .push(self.sort.order_expr())
            .push(" ")
            .push(self.order.keyword())
            .push(r#", ticker COLLATE "C" ASC LIMIT "#)
            .push_bind(self.limit.max(0))
            .push(" OFFSET ")
            .push_bind(self.offset.max(0));
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

fn like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('%');
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
