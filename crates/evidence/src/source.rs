use crate::error::{EvidenceSourceError, Result};
use crate::record_set::{load_from_json, EvidenceSet};
use serde_json::Value;
use std::collections::HashSet;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidencePage {
    pub records: Vec<Value>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl EvidencePage {
    /// Parse a listing response.
    ///
    /// Accepts `{"results": {"data": [...], "pageInfo": {...}}}` as well as the
    /// unwrapped `{"data": [...], "pageInfo": {...}}` form. A response without
    /// `pageInfo` is a single, final page.
    pub fn from_response(body: Value) -> Result<Self> {
        let mut body = match body {
            Value::Object(mut obj) => match obj.remove("results") {
                Some(Value::Object(results)) => results,
                Some(other) => {
                    return Err(EvidenceSourceError::decode(format!(
                        "'results' is not an object: {other}"
                    )))
                }
                None => obj,
            },
            Value::Array(records) => {
                return Ok(Self {
                    records,
                    ..Self::default()
                })
            }
            other => {
                return Err(EvidenceSourceError::decode(format!(
                    "unexpected listing body: {other}"
                )))
            }
        };

        let records = match body.remove("data") {
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(EvidenceSourceError::decode(format!(
                    "'data' is not an array: {other}"
                )))
            }
            None => return Err(EvidenceSourceError::decode("listing has no 'data'")),
        };

        let page_info = body.get("pageInfo");
        let has_next_page = page_info
            .and_then(|info| info.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_cursor = page_info
            .and_then(|info| info.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            records,
            has_next_page,
            end_cursor,
        })
    }
}

/// A cursor-paginated supplier of evidence records.
pub trait EvidenceSource {
    /// Fetch the page after `cursor` (`None` for the first page).
    fn fetch_page(&mut self, cursor: Option<&str>) -> Result<EvidencePage>;
}

/// Follow the cursor until the source reports no further pages.
///
/// Any failed page aborts the whole fetch; a partial set is never returned.
/// A cursor handed out twice means the listing loops and is an error.
pub fn fetch_all(source: &mut dyn EvidenceSource) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(cursor.as_deref())?;
        pages += 1;
        records.extend(page.records);

        if !page.has_next_page {
            break;
        }
        match page.end_cursor {
            Some(next) if seen.insert(next.clone()) => cursor = Some(next),
            Some(next) => {
                return Err(EvidenceSourceError::pagination(format!(
                    "cursor '{next}' repeated on page {pages}"
                )))
            }
            None => {
                return Err(EvidenceSourceError::pagination(format!(
                    "page {pages} reports more pages but no cursor"
                )))
            }
        }
    }

    log::debug!("Fetched {} records across {pages} pages", records.len());
    Ok(records)
}

/// Fetch every page and normalize the records.
pub fn load_paginated(source: &mut dyn EvidenceSource) -> Result<EvidenceSet> {
    load_from_json(fetch_all(source)?)
}
