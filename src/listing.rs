use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::models::Review;

/// Fixed page size of the public listing.
pub const PAGE_SIZE: u64 = 10;

/// Category values meaning "no category filter".
const ALL_CATEGORIES: [&str; 2] = ["all", "전체"];

/// ListQuery
///
/// Raw query parameters of `GET /reviews`. `page` stays a string so that garbage never
/// produces an extractor rejection; normalization happens in `ListingFilter`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Category to filter by. Empty or `all` lists every category.
    pub category: Option<String>,
    /// Tag to filter by. Ignored whenever a category filter applies.
    pub tag: Option<String>,
    /// 1-based page number. Invalid or non-positive values fall back to 1.
    pub page: Option<String>,
}

/// ReviewFilter
///
/// The single predicate shared by the count and the page fetch of one listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewFilter {
    All,
    Category(String),
    Tag(String),
}

impl ReviewFilter {
    /// Evaluates the predicate in memory. Storage backends with a query language render
    /// the same predicate natively.
    pub fn matches(&self, review: &Review) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => review.category == *category,
            Self::Tag(tag) => review.tags.iter().any(|t| t == tag),
        }
    }
}

/// ListingFilter
///
/// Normalized, request-scoped listing selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    pub filter: ReviewFilter,
    pub page: u64,
}

impl ListingFilter {
    /// from_query
    ///
    /// A real category wins over a tag: the tag is only consulted when the category is
    /// absent, empty or the "all" marker.
    pub fn from_query(query: &ListQuery) -> Self {
        let category = query
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && !is_all_marker(c));
        let tag = query.tag.as_deref().filter(|t| !t.is_empty());

        let filter = match (category, tag) {
            (Some(category), _) => ReviewFilter::Category(category.to_string()),
            (None, Some(tag)) => ReviewFilter::Tag(tag.to_string()),
            (None, None) => ReviewFilter::All,
        };

        Self {
            filter,
            page: parse_page(query.page.as_deref()),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(PAGE_SIZE)
    }

    pub const fn limit(&self) -> u64 {
        PAGE_SIZE
    }
}

fn is_all_marker(category: &str) -> bool {
    ALL_CATEGORIES
        .iter()
        .any(|marker| category.eq_ignore_ascii_case(marker))
}

/// Parses the page parameter, falling back to 1 on anything unusable.
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

pub const fn total_pages(total: u64) -> u64 {
    total.div_ceil(PAGE_SIZE)
}

/// ReviewPage
///
/// Paginated response envelope of `GET /reviews`. A page past the end is an empty
/// list, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub current_page: u64,
    pub total_pages: u64,
}

impl ReviewPage {
    pub fn new(reviews: Vec<Review>, listing: &ListingFilter, total: u64) -> Self {
        Self {
            reviews,
            current_page: listing.page,
            total_pages: total_pages(total),
        }
    }
}
