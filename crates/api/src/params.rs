use ratingscope_core::storage::{ListQuery, RatingFilter, SortField, SortOrder};
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Raw `GET /api/v1/stocks` query. Values stay as text so malformed numbers fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct StockListParams {
    pub ticker: Option<String>,
    pub brokerage: Option<String>,
    pub rating: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub order_by: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl StockListParams {
    /// First non-blank of ticker, brokerage, rating wins.
    pub fn filter(&self) -> RatingFilter {
        if let Some(t) = non_blank(&self.ticker) {
            return RatingFilter::TickerContains(t.to_string());
        }
        if let Some(b) = non_blank(&self.brokerage) {
            return RatingFilter::Brokerage(b.to_string());
        }
        if let Some(r) = non_blank(&self.rating) {
            return RatingFilter::Rating(r.to_string());
        }
        RatingFilter::All
    }

    pub fn pagination(&self) -> Pagination {
        let page = positive(&self.page).unwrap_or(1);
        let limit = positive(&self.page_size)
            .map(|s| s.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Pagination {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    pub fn list_query(&self) -> (ListQuery, Pagination) {
        let pagination = self.pagination();
        let query = ListQuery {
            filter: self.filter(),
            sort: non_blank(&self.order_by)
                .map(SortField::from_param)
                .unwrap_or_default(),
            order: non_blank(&self.sort)
                .map(SortOrder::from_param)
                .unwrap_or_default(),
            offset: pagination.offset,
            limit: pagination.limit,
        };
        (query, pagination)
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn positive(v: &Option<String>) -> Option<i64> {
    non_blank(v)
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> StockListParams {
        let mut p = StockListParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "ticker" => p.ticker = v,
                "brokerage" => p.brokerage = v,
                "rating" => p.rating = v,
                "page" => p.page = v,
                "page_size" => p.page_size = v,
                "order_by" => p.order_by = v,
                "sort" => p.sort = v,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    #[test]
    fn defaults_to_first_page_of_ten() {
        let p = params(&[]).pagination();
        assert_eq!(
            p,
            Pagination {
                page: 1,
                limit: 10,
                offset: 0
            }
        );
    }

    #[test]
    fn malformed_or_non_positive_values_fall_back() {
        let p = params(&[("page", "abc"), ("page_size", "-4")]).pagination();
        assert_eq!((p.page, p.limit), (1, 10));

        let p = params(&[("page", "0"), ("page_size", "0")]).pagination();
        assert_eq!((p.page, p.limit), (1, 10));
    }

    #[test]
    fn page_size_is_capped_and_offset_follows_page() {
        let p = params(&[("page", "3"), ("page_size", "500")]).pagination();
        assert_eq!(p.limit, 100);
        assert_eq!(p.offset, 200);

        let p = params(&[("page", "2"), ("page_size", "25")]).pagination();
        assert_eq!(p.offset, 25);
    }

    #[test]
    fn ticker_beats_brokerage_beats_rating() {
        let p = params(&[("ticker", "aa"), ("brokerage", "Acme"), ("rating", "Buy")]);
        assert_eq!(p.filter(), RatingFilter::TickerContains("aa".to_string()));

        let p = params(&[("ticker", "  "), ("brokerage", "Acme"), ("rating", "Buy")]);
        assert_eq!(p.filter(), RatingFilter::Brokerage("Acme".to_string()));

        let p = params(&[("rating", "Buy")]);
        assert_eq!(p.filter(), RatingFilter::Rating("Buy".to_string()));

        assert_eq!(params(&[]).filter(), RatingFilter::All);
    }

    #[test]
    fn sort_params_reach_the_query() {
        let (q, _) = params(&[("order_by", "ticker"), ("sort", "asc")]).list_query();
        assert_eq!(q.sort, SortField::Ticker);
        assert_eq!(q.order, SortOrder::Asc);

        let (q, _) = params(&[("order_by", "drop table"), ("sort", "sideways")]).list_query();
        assert_eq!(q.sort, SortField::Time);
        assert_eq!(q.order, SortOrder::Desc);
    }
}
