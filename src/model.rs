//! Data models for the listing service
//!
//! This module defines the property record stored in the database, the
//! request/response models of the HTTP API, and the page-result shape every
//! search query produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::storage::ImageStore;

/// Maximum number of images a listing may carry.
pub const MAX_IMAGES: usize = 5;

/// Kind of property a listing advertises.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    House,
    Flat,
    Villa,
    Apartment,
    Land,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Flat => "Flat",
            PropertyType::Villa => "Villa",
            PropertyType::Apartment => "Apartment",
            PropertyType::Land => "Land",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "house" => Ok(PropertyType::House),
            "flat" => Ok(PropertyType::Flat),
            "villa" => Ok(PropertyType::Villa),
            "apartment" => Ok(PropertyType::Apartment),
            "land" => Ok(PropertyType::Land),
            _ => Err(()),
        }
    }
}

/// Represents one property listing stored in the database
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Property {
    /// Unique listing identifier
    pub id: String,

    /// Short headline shown on listing cards
    pub title: String,

    /// Free-form description shown in the detail view
    #[serde(default)]
    pub description: String,

    /// Asking price, currency-less
    pub price: i64,

    pub city: String,
    pub country: String,

    /// Living area in m²
    pub area: i64,

    pub bedrooms: u32,
    pub bathrooms: u32,

    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Ordered storage keys of the listing images (up to [`MAX_IMAGES`]);
    /// resolved to public URLs at display time
    #[serde(default)]
    pub images: Vec<String>,

    /// Id of the owning user
    pub user_id: String,

    pub created_at: DateTime<Utc>,

    /// Curated flag for the home-page "featured" rail
    #[serde(default)]
    pub is_featured: bool,
}

/// One page of search results plus the total match count.
///
/// Recomputed in full on every query execution; never cached or updated
/// incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Listings for the requested page, at most one page-size worth
    pub items: Vec<Property>,

    /// Total number of listings matching the filter, ignoring pagination
    pub total_count: usize,

    /// The 1-based page this result holds
    pub page: usize,

    /// Derived page count; 1 when there are no matches at all
    pub total_pages: usize,
}

impl PageResult {
    pub fn new(items: Vec<Property>, total_count: usize, page: usize, page_size: usize) -> Self {
        let total_pages = if total_count == 0 {
            1
        } else {
            total_count.div_ceil(page_size)
        };

        PageResult {
            items,
            total_count,
            page,
            total_pages,
        }
    }
}

/// Request payload for creating or replacing a listing
///
/// # Example
/// ```json
/// {
///   "title": "Villa with sea view",
///   "price": 250000,
///   "city": "Bali",
///   "country": "Indonesia",
///   "area": 180,
///   "bedrooms": 3,
///   "bathrooms": 2,
///   "type": "Villa",
///   "images": ["a1b2c3.jpg"]
/// }
/// ```
#[derive(Deserialize)]
pub struct PostingRequest {
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub price: i64,
    pub city: String,
    pub country: String,
    pub area: i64,
    pub bedrooms: u32,
    pub bathrooms: u32,

    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Storage keys returned by the image upload endpoint
    #[serde(default)]
    pub images: Vec<String>,
}

impl PostingRequest {
    /// Checks the same constraints the posting form applies.
    ///
    /// Returns the first violation as a user-facing message.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("Title is required");
        }
        if self.price < 1000 {
            return Err("Price must be at least 1000");
        }
        if self.city.trim().is_empty() {
            return Err("City is required");
        }
        if self.country.trim().is_empty() {
            return Err("Country is required");
        }
        if self.area < 10 {
            return Err("Area must be at least 10 m²");
        }
        if self.bedrooms < 1 {
            return Err("Number of bedrooms is required");
        }
        if self.images.len() > MAX_IMAGES {
            return Err("You can upload up to 5 images only.");
        }
        Ok(())
    }
}

/// Listing as returned by the API, with image keys resolved to public URLs
#[derive(Serialize)]
pub struct PropertyResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub city: String,
    pub country: String,
    pub area: i64,
    pub bedrooms: u32,
    pub bathrooms: u32,

    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Raw storage keys, echoed so edit forms can resubmit them
    pub images: Vec<String>,

    /// Public URLs for display
    pub image_urls: Vec<String>,

    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub is_featured: bool,
}

impl PropertyResponse {
    pub fn from_property(property: Property, images: &ImageStore) -> Self {
        let image_urls = property
            .images
            .iter()
            .map(|key| images.public_url(key))
            .collect();

        PropertyResponse {
            id: property.id,
            title: property.title,
            description: property.description,
            price: property.price,
            city: property.city,
            country: property.country,
            area: property.area,
            bedrooms: property.bedrooms,
            bathrooms: property.bathrooms,
            property_type: property.property_type,
            images: property.images,
            image_urls,
            user_id: property.user_id,
            created_at: property.created_at,
            is_featured: property.is_featured,
        }
    }
}

/// Query parameters of the listing search endpoint
///
/// Absent parameters, empty strings, and the filter-bar sentinel labels
/// ("Property Type", "Price", "Area", "All Cities", "All Countries") all mean
/// "no filter" for their field.
#[derive(Deserialize, Default)]
pub struct SearchParams {
    /// Free-text term matched against city, country, and type
    pub search: Option<String>,

    #[serde(rename = "type")]
    pub property_type: Option<String>,

    /// Price bucket label, e.g. "Under $100k"
    pub price: Option<String>,

    /// Area bucket label, e.g. "100-200 m²"
    pub area: Option<String>,

    pub city: Option<String>,
    pub country: Option<String>,

    /// Restrict to curated listings (home-page rail)
    pub featured: Option<bool>,

    /// "price" (default) or "area"
    pub sort_by: Option<String>,

    /// "asc" (default) or "desc"
    pub order: Option<String>,

    /// Page number, starts from 1
    pub page: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str) -> Property {
        Property {
            id: id.to_string(),
            title: "t".to_string(),
            description: String::new(),
            price: 100_000,
            city: "Bali".to_string(),
            country: "Indonesia".to_string(),
            area: 120,
            bedrooms: 2,
            bathrooms: 1,
            property_type: PropertyType::Villa,
            images: vec![],
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            is_featured: false,
        }
    }

    #[test]
    fn total_pages_rounds_up() {
        let result = PageResult::new(vec![], 25, 1, 10);
        assert_eq!(result.total_pages, 3);

        let result = PageResult::new(vec![], 30, 1, 10);
        assert_eq!(result.total_pages, 3);
    }

    #[test]
    fn total_pages_is_one_when_empty() {
        let result = PageResult::new(vec![], 0, 1, 10);
        assert_eq!(result.total_pages, 1);
        assert!(result.items.is_empty());
    }

    #[test]
    fn posting_request_validation() {
        let mut req = PostingRequest {
            title: "Villa".to_string(),
            description: String::new(),
            price: 250_000,
            city: "Bali".to_string(),
            country: "Indonesia".to_string(),
            area: 180,
            bedrooms: 3,
            bathrooms: 2,
            property_type: PropertyType::Villa,
            images: vec![],
        };
        assert!(req.validate().is_ok());

        req.price = 500;
        assert_eq!(req.validate(), Err("Price must be at least 1000"));
        req.price = 250_000;

        req.images = (0..6).map(|i| format!("img{}.jpg", i)).collect();
        assert_eq!(req.validate(), Err("You can upload up to 5 images only."));
    }

    #[test]
    fn property_type_round_trips_through_labels() {
        for label in ["House", "Flat", "Villa", "Apartment", "Land"] {
            let parsed: PropertyType = label.parse().unwrap();
            assert_eq!(parsed.as_str(), label);
        }
        assert!("Castle".parse::<PropertyType>().is_err());
    }

    #[test]
    fn page_result_keeps_requested_page() {
        let result = PageResult::new(vec![listing("a")], 11, 2, 10);
        assert_eq!(result.page, 2);
        assert_eq!(result.total_pages, 2);
    }
}
