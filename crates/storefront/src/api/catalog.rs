//! Product and category queries.

use emporium_core::{Category, Page, Product, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::conversions;
use super::wire::{CategoryWire, ProductWire};
use crate::gateway::{ApiError, Endpoint, RequestSpec, Tag, TagKind};

/// Arguments of the product list query, as sent to `GET /products`.
///
/// Produced by the catalog composer; `None` fields are omitted from both the
/// request and the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    pub page: u32,
    pub limit: u32,
}

/// `GET /products`
pub struct ListProducts;

impl Endpoint for ListProducts {
    const NAME: &'static str = "listProducts";
    type Args = ProductListArgs;
    type Output = Page<Product>;

    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("products")
            .query_opt("category", args.category.as_deref())
            .query_opt("minPrice", args.min_price)
            .query_opt("maxPrice", args.max_price)
            .query_opt("minRating", args.min_rating)
            .query_opt("search", args.search.as_deref())
            .query_opt("sort", args.sort.as_deref())
            .query("page", args.page)
            .query("limit", args.limit))
    }

    fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let mut tags = vec![Tag::kind(TagKind::Product)];
        tags.extend(
            output
                .into_iter()
                .flat_map(|page| &page.items)
                .map(|product| Tag::id(TagKind::Product, product.id)),
        );
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::page::<ProductWire, _>(body, conversions::product)
    }
}

/// `GET /products/{id}`
pub struct GetProduct;

impl Endpoint for GetProduct {
    const NAME: &'static str = "getProduct";
    type Args = ProductId;
    type Output = Product;

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get(format!("products/{id}")))
    }

    fn provides(id: &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::id(TagKind::Product, id)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<ProductWire>(body).and_then(conversions::product)
    }
}

/// `GET /categories`
pub struct ListCategories;

impl Endpoint for ListCategories {
    const NAME: &'static str = "listCategories";
    type Args = ();
    type Output = Vec<Category>;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("categories"))
    }

    fn provides((): &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let mut tags = vec![Tag::kind(TagKind::Category)];
        tags.extend(
            output
                .into_iter()
                .flatten()
                .map(|category| Tag::id(TagKind::Category, category.id)),
        );
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::list::<CategoryWire, _>(body, conversions::category)
    }
}
