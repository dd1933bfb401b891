//! Typed catalogue of the remote API.
//!
//! Each operation is a zero-sized type implementing
//! [`Endpoint`](crate::gateway::Endpoint) or
//! [`Mutation`](crate::gateway::Mutation). Responses are normalized here:
//! the `{ data }` envelope is unwrapped, snake_case keys are camelized, and
//! the raw wire shape is converted into the fixed types of `emporium-core`.
//!
//! # Modules
//!
//! - [`catalog`] - Products and categories
//! - [`account`] - Profile, addresses, saved payment methods
//! - [`orders`] - Order history and checkout
//! - [`auth`] - Login, registration, token refresh
//! - [`contact`] - Contact form
//! - [`admin`] - Back-office operations

pub mod account;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod contact;
pub mod orders;

mod conversions;
pub(crate) mod wire;

use emporium_core::{Page, Pagination};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::gateway::ApiError;

/// Unwrap a `{ "data": ... }` envelope. Bodies without one pass through.
pub(crate) fn data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Unwrap, camelize, and deserialize a response body.
pub(crate) fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(wire::camelize(data(body)))
        .map_err(|e| ApiError::parsing(format!("unexpected response shape: {e}")))
}

/// Decode a list body and convert every element.
pub(crate) fn list<W, T>(
    body: Value,
    convert: fn(W) -> Result<T, ApiError>,
) -> Result<Vec<T>, ApiError>
where
    W: DeserializeOwned,
{
    decode::<Vec<W>>(body)?.into_iter().map(convert).collect()
}

/// Decode one page of a paginated list.
///
/// Accepts a bare array, `{ data: [...], pagination }`, or
/// `{ data: { items, pagination } }`. Missing pagination fields are derived
/// from the items.
pub(crate) fn page<W, T>(
    body: Value,
    convert: fn(W) -> Result<T, ApiError>,
) -> Result<Page<T>, ApiError>
where
    W: DeserializeOwned,
{
    let body = wire::camelize(body);
    let (items, pagination) = split_page(body)?;

    let items: Vec<W> = serde_json::from_value(items)
        .map_err(|e| ApiError::parsing(format!("unexpected list shape: {e}")))?;
    let items = items.into_iter().map(convert).collect::<Result<Vec<_>, _>>()?;

    let pagination: wire::PaginationWire = match pagination {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| ApiError::parsing(format!("unexpected pagination shape: {e}")))?,
        None => wire::PaginationWire::default(),
    };

    let pagination = complete_pagination(&pagination, items.len());
    Ok(Page { items, pagination })
}

fn split_page(body: Value) -> Result<(Value, Option<Value>), ApiError> {
    fn take_items(map: &mut serde_json::Map<String, Value>) -> Option<Value> {
        ["items", "results", "rows"]
            .iter()
            .find_map(|field| map.remove(*field))
    }

    match body {
        Value::Array(_) => Ok((body, None)),
        Value::Object(mut map) => {
            let outer = map.remove("pagination").or_else(|| map.remove("meta"));
            match map.remove("data") {
                Some(items @ Value::Array(_)) => Ok((items, outer)),
                Some(Value::Object(mut inner)) => {
                    let items = take_items(&mut inner)
                        .ok_or_else(|| ApiError::parsing("paginated body has no items"))?;
                    let pagination = inner.remove("pagination").or(outer);
                    Ok((items, pagination))
                }
                Some(_) => Err(ApiError::parsing("paginated body has non-list data")),
                None => take_items(&mut map)
                    .map(|items| (items, outer))
                    .ok_or_else(|| ApiError::parsing("paginated body has no items")),
            }
        }
        _ => Err(ApiError::parsing("paginated body is not a list")),
    }
}

fn complete_pagination(wire: &wire::PaginationWire, count: usize) -> Pagination {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    let limit = wire.limit.filter(|l| *l > 0).unwrap_or(count.max(1));
    let total = wire.total.unwrap_or_else(|| u64::from(count));
    let total_pages = wire.total_pages.unwrap_or_else(|| {
        u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
    });

    Pagination {
        page: wire.page.filter(|p| *p > 0).unwrap_or(1),
        limit,
        total,
        total_pages: total_pages.max(1),
    }
}
