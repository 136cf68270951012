//! Search filter composition
//!
//! Translates the filter-bar state (free text, property type, price bucket,
//! area bucket, city, country) plus sort and page into a [`PropertyQuery`]:
//! an ordered list of predicate clauses applied conjunctively, with sort and
//! pagination attached. Composition is a pure mapping with no failure modes;
//! executing the query is the store's job.

use crate::model::{Property, PropertyType, SearchParams};

/// Filter-bar sentinel labels; selecting one of these means "no filter".
pub const PROPERTY_TYPE_SENTINEL: &str = "Property Type";
pub const PRICE_SENTINEL: &str = "Price";
pub const AREA_SENTINEL: &str = "Area";
pub const ALL_CITIES_SENTINEL: &str = "All Cities";
pub const ALL_COUNTRIES_SENTINEL: &str = "All Countries";

/// Discrete price range offered by the filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceBucket {
    #[default]
    Any,
    /// price ≤ 100 000
    Under100k,
    /// 100 000 ≤ price ≤ 300 000
    From100kTo300k,
    /// price ≥ 300 000
    Over300k,
}

impl PriceBucket {
    /// Maps a filter-bar label to a bucket. The sentinel and unknown labels
    /// mean no price filter.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Under $100k" => PriceBucket::Under100k,
            "$100k - $300k" => PriceBucket::From100kTo300k,
            "Over $300k" => PriceBucket::Over300k,
            _ => PriceBucket::Any,
        }
    }

    /// Inclusive (min, max) bounds of the bucket.
    pub fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            PriceBucket::Any => (None, None),
            PriceBucket::Under100k => (None, Some(100_000)),
            PriceBucket::From100kTo300k => (Some(100_000), Some(300_000)),
            PriceBucket::Over300k => (Some(300_000), None),
        }
    }
}

/// Discrete living-area range offered by the filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaBucket {
    #[default]
    Any,
    /// 0 – 100 m²
    UpTo100,
    /// 100 – 200 m²
    From100To200,
    /// 200 – 300 m²
    From200To300,
    /// 300 m² and above
    Over300,
}

impl AreaBucket {
    pub fn from_label(label: &str) -> Self {
        match label {
            "0-100 m²" => AreaBucket::UpTo100,
            "100-200 m²" => AreaBucket::From100To200,
            "200-300 m²" => AreaBucket::From200To300,
            "300+ m²" => AreaBucket::Over300,
            _ => AreaBucket::Any,
        }
    }

    /// Inclusive (min, max) bounds of the bucket.
    pub fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            AreaBucket::Any => (None, None),
            AreaBucket::UpTo100 => (Some(0), Some(100)),
            AreaBucket::From100To200 => (Some(100), Some(200)),
            AreaBucket::From200To300 => (Some(200), Some(300)),
            AreaBucket::Over300 => (Some(300), None),
        }
    }
}

/// The filter-bar state, normalized: sentinels and blanks become `None`/`Any`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub search_term: Option<String>,
    pub property_type: Option<PropertyType>,
    pub price: PriceBucket,
    pub area: AreaBucket,
    pub city: Option<String>,
    pub country: Option<String>,
    pub featured_only: bool,
}

impl FilterSelection {
    /// Normalizes raw search query parameters into a selection.
    pub fn from_params(params: &SearchParams) -> Self {
        FilterSelection {
            search_term: non_sentinel(params.search.as_deref(), ""),
            property_type: non_sentinel(params.property_type.as_deref(), PROPERTY_TYPE_SENTINEL)
                .and_then(|label| label.parse().ok()),
            price: params
                .price
                .as_deref()
                .map(PriceBucket::from_label)
                .unwrap_or_default(),
            area: params
                .area
                .as_deref()
                .map(AreaBucket::from_label)
                .unwrap_or_default(),
            city: non_sentinel(params.city.as_deref(), ALL_CITIES_SENTINEL),
            country: non_sentinel(params.country.as_deref(), ALL_COUNTRIES_SENTINEL),
            featured_only: params.featured.unwrap_or(false),
        }
    }
}

fn non_sentinel(value: Option<&str>, sentinel: &str) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != sentinel)
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Price,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Requested result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn from_params(params: &SearchParams) -> Self {
        let field = match params.sort_by.as_deref() {
            Some(v) if v.eq_ignore_ascii_case("area") => SortField::Area,
            _ => SortField::Price,
        };
        let direction = match params.order.as_deref() {
            Some(v) if v.eq_ignore_ascii_case("desc") => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        SortSpec { field, direction }
    }
}

/// One predicate clause of a composed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Case-insensitive substring match against city, country, or type.
    /// Carries the already-lowercased needle.
    Text(String),
    Type(PropertyType),
    MinPrice(i64),
    MaxPrice(i64),
    City(String),
    Country(String),
    MinArea(i64),
    MaxArea(i64),
    Featured,
}

impl Filter {
    fn matches(&self, property: &Property) -> bool {
        match self {
            Filter::Text(needle) => {
                property.city.to_lowercase().contains(needle)
                    || property.country.to_lowercase().contains(needle)
                    || property
                        .property_type
                        .as_str()
                        .to_lowercase()
                        .contains(needle)
            }
            Filter::Type(kind) => property.property_type == *kind,
            Filter::MinPrice(min) => property.price >= *min,
            Filter::MaxPrice(max) => property.price <= *max,
            Filter::City(city) => property.city == *city,
            Filter::Country(country) => property.country == *country,
            Filter::MinArea(min) => property.area >= *min,
            Filter::MaxArea(max) => property.area <= *max,
            Filter::Featured => property.is_featured,
        }
    }
}

/// A fully specified listing query: predicate clauses, sort, and page.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    pub filters: Vec<Filter>,
    pub sort: SortSpec,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl PropertyQuery {
    /// Composes a query from a filter selection. Pure; inactive filters
    /// contribute no clause.
    pub fn compose(
        selection: &FilterSelection,
        sort: SortSpec,
        page: usize,
        page_size: usize,
    ) -> Self {
        let mut filters = Vec::new();

        if selection.featured_only {
            filters.push(Filter::Featured);
        }
        if let Some(term) = &selection.search_term {
            filters.push(Filter::Text(term.to_lowercase()));
        }
        if let Some(kind) = selection.property_type {
            filters.push(Filter::Type(kind));
        }
        let (min_price, max_price) = selection.price.bounds();
        if let Some(min) = min_price {
            filters.push(Filter::MinPrice(min));
        }
        if let Some(max) = max_price {
            filters.push(Filter::MaxPrice(max));
        }
        if let Some(city) = &selection.city {
            filters.push(Filter::City(city.clone()));
        }
        if let Some(country) = &selection.country {
            filters.push(Filter::Country(country.clone()));
        }
        let (min_area, max_area) = selection.area.bounds();
        if let Some(min) = min_area {
            filters.push(Filter::MinArea(min));
        }
        if let Some(max) = max_area {
            filters.push(Filter::MaxArea(max));
        }

        PropertyQuery {
            filters,
            sort,
            page: page.max(1),
            page_size,
        }
    }

    /// True when the property satisfies every clause.
    pub fn matches(&self, property: &Property) -> bool {
        self.filters.iter().all(|filter| filter.matches(property))
    }

    /// Orders matched listings by the requested field and direction.
    /// Ties keep no particular order.
    pub fn sort_items(&self, items: &mut [Property]) {
        match self.sort.field {
            SortField::Price => items.sort_unstable_by_key(|p| p.price),
            SortField::Area => items.sort_unstable_by_key(|p| p.area),
        }
        if self.sort.direction == SortDirection::Descending {
            items.reverse();
        }
    }

    /// Number of items the requested page skips past.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }
}
