//! Recovers a [`TransactionData`] from free-form model output.
//!
//! Model replies are supposed to be bare JSON but routinely arrive wrapped in a
//! markdown fence or surrounded by prose, and while streaming they are simply
//! unfinished. Every stage here is tried in order and the first that yields a
//! well-formed reply wins; nothing in this module returns an error.

use log::debug;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::models::transaction::TransactionData;

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json\s*\n?(.*?)\n?```").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Interpretation {
    Structured(TransactionData),
    /// Looks like JSON that has not finished arriving.
    Incomplete,
    NoData,
}

impl Interpretation {
    pub fn into_data(self) -> Option<TransactionData> {
        match self {
            Interpretation::Structured(data) => Some(data),
            _ => None,
        }
    }
}

pub fn interpret(text: &str) -> Interpretation {
    let clean = text.trim();
    if clean.is_empty() {
        return Interpretation::NoData;
    }

    if let Some(data) = parse_document(clean) {
        return Interpretation::Structured(data);
    }

    if let Some(data) = parse_fenced(clean) {
        return Interpretation::Structured(data);
    }

    if let Some(data) = parse_outer_braces(clean) {
        return Interpretation::Structured(data);
    }

    if is_partial_object(clean) {
        Interpretation::Incomplete
    } else {
        Interpretation::NoData
    }
}

fn parse_document(text: &str) -> Option<TransactionData> {
    match serde_json::from_str::<TransactionData>(text) {
        Ok(data) => Some(data),
        Err(e) => {
            debug!("reply is not a bare JSON document: {}", e);
            None
        }
    }
}

fn parse_fenced(text: &str) -> Option<TransactionData> {
    let inner = JSON_FENCE.captures(text)?.get(1)?.as_str().trim();
    serde_json::from_str(inner)
        .map_err(|e| debug!("fenced json block did not parse: {}", e))
        .ok()
}

// Greedy: first '{' to last '}'.
fn parse_outer_braces(text: &str) -> Option<TransactionData> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| debug!("embedded object did not parse: {}", e))
        .ok()
}

fn is_partial_object(text: &str) -> bool {
    text.starts_with('{') && !text.ends_with('}')
}
