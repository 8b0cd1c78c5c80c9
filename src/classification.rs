//! Decoders turning raw list answers into classification tags.
//!
//! Each backend speaks one encoding:
//! - DNSBLs answer with one or more return codes, looked up in a [`CodeTable`]
//! - HTTP list APIs answer `Listed,TAG1,TAG2` or `Not listed`
//! - batch lookup APIs answer one line per submitted URL, in order

use crate::error::{ReputationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Set of classification tags attached to a match.
pub type Classification = BTreeSet<String>;

/// How return codes are looked up in a [`CodeTable`].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodeDecoding {
    /// Every return code is a key of the table.
    #[default]
    Exact,
    /// Every return code is a sum of flags; each set bit is a key.
    Bitmask,
}

/// Static mapping from list return codes to classification tags.
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    decoding: CodeDecoding,
    codes: HashMap<u32, String>,
}

impl CodeTable {
    pub fn new<I, S>(decoding: CodeDecoding, codes: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            decoding,
            codes: codes.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    /// Table whose keys are complete return codes.
    pub fn exact<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self::new(CodeDecoding::Exact, codes)
    }

    /// Table whose keys are single-bit flags.
    pub fn bitmask<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self::new(CodeDecoding::Bitmask, codes)
    }

    /// Classify a single return code.
    pub fn classify(&self, code: u32) -> Result<Classification> {
        match self.decoding {
            CodeDecoding::Exact => self.tag(code).map(|tag| Classification::from([tag])),
            CodeDecoding::Bitmask => {
                if code == 0 {
                    return Err(ReputationError::UnknownCode { code });
                }
                (0..u32::BITS)
                    .map(|bit| 1 << bit)
                    .filter(|flag| code & flag != 0)
                    .map(|flag| self.tag(flag))
                    .collect()
            }
        }
    }

    /// Classify every return code of one answer and merge the tags.
    ///
    /// A single unmapped code fails the whole answer.
    pub fn decode<I>(&self, codes: I) -> Result<Classification>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut classification = Classification::new();
        for code in codes {
            classification.extend(self.classify(code)?);
        }
        Ok(classification)
    }

    fn tag(&self, code: u32) -> Result<String> {
        self.codes
            .get(&code)
            .cloned()
            .ok_or(ReputationError::UnknownCode { code })
    }
}

/// Answer of a single-host HTTP list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    NotListed,
    /// Listed; the tag set may be empty when the list gives no classes.
    Listed(Classification),
}

const LISTED: &str = "Listed";
const NOT_LISTED: &str = "Not listed";

/// Decode a `Listed,TAG1,TAG2` / `Not listed` body.
pub fn decode_listing(backend: &str, body: &str) -> Result<Listing> {
    let body = body.trim();
    if body == NOT_LISTED {
        return Ok(Listing::NotListed);
    }

    let mut fields = body.split(',').map(str::trim);
    match fields.next() {
        Some(LISTED) => Ok(Listing::Listed(
            fields.filter(|f| !f.is_empty()).map(str::to_string).collect(),
        )),
        _ => Err(ReputationError::invalid_response(
            backend,
            format!("unexpected body: {body:?}"),
        )),
    }
}

/// Line used by batch lookup APIs for a URL that did not match.
pub const NOT_MATCHED: &str = "ok";

/// Decode a batch answer: line `i` classifies submitted URL `i`.
///
/// Returns `None` at the positions of URLs that did not match.
pub fn decode_batch_lines(
    backend: &str,
    body: &str,
    expected: usize,
) -> Result<Vec<Option<Classification>>> {
    let lines: Vec<&str> = body.lines().map(str::trim).collect();
    if lines.len() != expected {
        return Err(ReputationError::invalid_response(
            backend,
            format!("expected {expected} lines, got {}", lines.len()),
        ));
    }

    lines
        .into_iter()
        .map(|line| match line {
            NOT_MATCHED => Ok(None),
            "" => Err(ReputationError::invalid_response(backend, "empty classification line")),
            tags => Ok(Some(tags.split(',').map(|t| t.trim().to_string()).collect())),
        })
        .collect()
}
