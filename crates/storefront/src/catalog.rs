//! Catalog query composer.
//!
//! Turns the filter state selected in the UI into [`ProductListArgs`] for
//! the product list query. Arguments left at their defaults are omitted, so
//! equivalent filter states share one cache entry.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::catalog::ProductListArgs;
use crate::config::CatalogConfig;

/// Product ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Server-defined relevance order.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    RatingDesc,
    Newest,
}

impl SortMode {
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::RatingDesc,
        Self::Newest,
    ];

    /// The `sort` query value, `None` for the default order.
    #[must_use]
    pub const fn as_param(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::PriceAsc => Some("priceAsc"),
            Self::PriceDesc => Some("priceDesc"),
            Self::RatingDesc => Some("ratingDesc"),
            Self::Newest => Some("newest"),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param().unwrap_or("default"))
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown sort mode: {0}")]
pub struct UnknownSortMode(String);

impl FromStr for SortMode {
    type Err = UnknownSortMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSortMode(s.to_string()))
    }
}

/// Minimum star rating filter. Only whole thresholds of 2, 3 and 4 exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MinRating {
    #[default]
    Any,
    Two,
    Three,
    Four,
}

impl MinRating {
    /// The nearest allowed threshold at or below `stars`.
    #[must_use]
    pub const fn round_down(stars: u8) -> Self {
        match stars {
            0 | 1 => Self::Any,
            2 => Self::Two,
            3 => Self::Three,
            _ => Self::Four,
        }
    }

    #[must_use]
    pub const fn stars(self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

impl From<u8> for MinRating {
    fn from(stars: u8) -> Self {
        Self::round_down(stars)
    }
}

/// Category selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Slug(String),
}

impl From<&str> for CategoryFilter {
    /// `"all"` and blank input select every category.
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Slug(s.to_string())
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Filter, sort and page selected in the UI.
///
/// Every setter that changes a filter returns the page to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilterState {
    category: CategoryFilter,
    price_min: Decimal,
    price_max: Decimal,
    min_rating: MinRating,
    search_text: String,
    sort_mode: SortMode,
    page: u32,
}

impl QueryFilterState {
    /// Unfiltered state on page 1, with the price filter spanning
    /// `0..=price_max`.
    #[must_use]
    pub fn new(price_max: Decimal) -> Self {
        Self {
            category: CategoryFilter::All,
            price_min: Decimal::ZERO,
            price_max,
            min_rating: MinRating::Any,
            search_text: String::new(),
            sort_mode: SortMode::Default,
            page: 1,
        }
    }

    #[must_use]
    pub const fn category(&self) -> &CategoryFilter {
        &self.category
    }

    #[must_use]
    pub const fn price_range(&self) -> (Decimal, Decimal) {
        (self.price_min, self.price_max)
    }

    #[must_use]
    pub const fn min_rating(&self) -> MinRating {
        self.min_rating
    }

    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    #[must_use]
    pub const fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    pub fn set_category(&mut self, category: impl Into<CategoryFilter>) -> &mut Self {
        let category = category.into();
        if self.category != category {
            self.category = category;
            self.page = 1;
        }
        self
    }

    /// Set both bounds. A minimum above the maximum is lowered to it.
    ///
    /// Bounds are stored without trailing zeros, so `20` and `20.00` are
    /// the same filter.
    pub fn set_price_range(&mut self, min: Decimal, max: Decimal) -> &mut Self {
        let max = max.max(Decimal::ZERO).normalize();
        let min = min.max(Decimal::ZERO).min(max).normalize();
        if (self.price_min, self.price_max) != (min, max) {
            self.price_min = min;
            self.price_max = max;
            self.page = 1;
        }
        self
    }

    pub fn set_min_rating(&mut self, rating: impl Into<MinRating>) -> &mut Self {
        let rating = rating.into();
        if self.min_rating != rating {
            self.min_rating = rating;
            self.page = 1;
        }
        self
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if self.search_text != text {
            self.search_text = text;
            self.page = 1;
        }
        self
    }

    pub fn set_sort_mode(&mut self, sort_mode: SortMode) -> &mut Self {
        if self.sort_mode != sort_mode {
            self.sort_mode = sort_mode;
            self.page = 1;
        }
        self
    }

    /// Move to `page`; 0 is treated as 1.
    pub fn set_page(&mut self, page: u32) -> &mut Self {
        self.page = page.max(1);
        self
    }

    /// Equal in everything but the page.
    fn same_filters(&self, other: &Self) -> bool {
        self.category == other.category
            && self.price_min == other.price_min
            && self.price_max == other.price_max
            && self.min_rating == other.min_rating
            && self.search_text == other.search_text
            && self.sort_mode == other.sort_mode
    }

    /// Clamp prices, strip their trailing zeros, and trim the search text.
    fn normalized(&self, price_cap: Decimal) -> Self {
        let price_max = self.price_max.clamp(Decimal::ZERO, price_cap).normalize();
        Self {
            category: self.category.clone(),
            price_min: self.price_min.max(Decimal::ZERO).min(price_max).normalize(),
            price_max,
            min_rating: self.min_rating,
            search_text: self.search_text.trim().to_string(),
            sort_mode: self.sort_mode,
            page: self.page.max(1),
        }
    }
}

/// Builds product list arguments from filter state.
///
/// Remembers the last state it composed: a state whose filters differ from
/// it is composed for page 1 whatever page it carries.
#[derive(Debug)]
pub struct CatalogComposer {
    default_price_max: Decimal,
    page_size: u32,
    last: Mutex<Option<QueryFilterState>>,
}

impl CatalogComposer {
    #[must_use]
    pub const fn new(config: CatalogConfig) -> Self {
        Self {
            default_price_max: config.price_max,
            page_size: config.page_size,
            last: Mutex::new(None),
        }
    }

    /// An unfiltered state matching this composer's defaults.
    #[must_use]
    pub fn initial_state(&self) -> QueryFilterState {
        QueryFilterState::new(self.default_price_max)
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The last state composed, after normalization.
    #[must_use]
    pub fn last(&self) -> Option<QueryFilterState> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Compose the arguments for `state`.
    pub fn compose(&self, state: &QueryFilterState) -> ProductListArgs {
        let mut state = state.normalized(self.default_price_max);

        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = last.as_ref()
                && !previous.same_filters(&state)
                && state.page != 1
            {
                debug!(page = state.page, "Filters changed, returning to page 1");
                state.page = 1;
            }
            *last = Some(state.clone());
        }

        self.args(&state)
    }

    fn args(&self, state: &QueryFilterState) -> ProductListArgs {
        ProductListArgs {
            category: match &state.category {
                CategoryFilter::All => None,
                CategoryFilter::Slug(slug) => Some(slug.clone()),
            },
            min_price: (state.price_min > Decimal::ZERO).then_some(state.price_min),
            max_price: (state.price_max < self.default_price_max).then_some(state.price_max),
            min_rating: match state.min_rating {
                MinRating::Any => None,
                rating => Some(rating.stars()),
            },
            search: (!state.search_text.is_empty()).then(|| state.search_text.clone()),
            sort: state.sort_mode.as_param().map(str::to_string),
            page: state.page,
            limit: self.page_size,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::catalog::ListProducts;
    use crate::gateway::QueryGateway;

    fn composer() -> CatalogComposer {
        CatalogComposer::new(CatalogConfig {
            page_size: 12,
            price_max: Decimal::from(1000),
        })
    }

    #[test]
    fn test_defaults_are_omitted() {
        let composer = composer();
        let args = composer.compose(&composer.initial_state());

        assert_eq!(
            args,
            ProductListArgs {
                page: 1,
                limit: 12,
                ..ProductListArgs::default()
            }
        );
    }

    #[test]
    fn test_every_filter() {
        let composer = composer();
        let mut state = composer.initial_state();
        state
            .set_category("shoes")
            .set_price_range(Decimal::from(20), Decimal::from(200))
            .set_min_rating(3)
            .set_search_text("  trail runner ")
            .set_sort_mode(SortMode::PriceDesc);

        let args = composer.compose(&state);
        assert_eq!(args.category.as_deref(), Some("shoes"));
        assert_eq!(args.min_price, Some(Decimal::from(20)));
        assert_eq!(args.max_price, Some(Decimal::from(200)));
        assert_eq!(args.min_rating, Some(3));
        assert_eq!(args.search.as_deref(), Some("trail runner"));
        assert_eq!(args.sort.as_deref(), Some("priceDesc"));
    }

    #[test]
    fn test_blank_search_and_all_category_omitted() {
        let composer = composer();
        let mut state = composer.initial_state();
        state.set_category("all").set_search_text("   ");

        let args = composer.compose(&state);
        assert!(args.category.is_none());
        assert!(args.search.is_none());
    }

    #[test]
    fn test_min_price_clamped_to_max() {
        let composer = composer();
        let mut state = composer.initial_state();
        state.set_price_range(Decimal::from(500), Decimal::from(100));
        assert_eq!(state.price_range(), (Decimal::from(100), Decimal::from(100)));

        let args = composer.compose(&state);
        assert_eq!(args.min_price, Some(Decimal::from(100)));
        assert_eq!(args.max_price, Some(Decimal::from(100)));
    }

    #[test]
    fn test_price_scale_does_not_change_cache_key() {
        let composer = composer();
        let mut whole = composer.initial_state();
        whole.set_price_range(Decimal::from(20), Decimal::from(200));
        let mut cents = composer.initial_state();
        cents.set_price_range(Decimal::new(2000, 2), Decimal::new(20000, 2));
        assert_eq!(whole, cents);

        let whole = QueryGateway::key::<ListProducts>(&composer.compose(&whole)).unwrap();
        let cents = QueryGateway::key::<ListProducts>(&composer.compose(&cents)).unwrap();
        assert_eq!(whole, cents);
    }

    #[test]
    fn test_rating_rounds_down() {
        assert_eq!(MinRating::from(1), MinRating::Any);
        assert_eq!(MinRating::from(3), MinRating::Three);
        assert_eq!(MinRating::from(5), MinRating::Four);
    }

    #[test]
    fn test_setters_reset_page() {
        let composer = composer();
        let mut state = composer.initial_state();
        state.set_page(4);
        state.set_sort_mode(SortMode::Default);
        assert_eq!(state.page(), 4);

        state.set_sort_mode(SortMode::Newest);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn test_changed_filters_compose_first_page() {
        let composer = composer();
        let mut state = composer.initial_state();
        state.set_page(3);
        assert_eq!(composer.compose(&state).page, 3);

        // Filter changed behind the setters' back: fields are compared with
        // the last composed state.
        let mut changed = state.clone();
        changed.search_text = "mug".to_string();
        assert_eq!(composer.compose(&changed).page, 1);
        assert_eq!(composer.last().unwrap().page(), 1);

        changed.set_page(2);
        assert_eq!(composer.compose(&changed).page, 2);
    }

    #[test]
    fn test_sort_mode_parse() {
        assert_eq!("priceasc".parse::<SortMode>().unwrap(), SortMode::PriceAsc);
        assert_eq!("default".parse::<SortMode>().unwrap(), SortMode::Default);
        assert!("cheapest".parse::<SortMode>().is_err());
    }
}
