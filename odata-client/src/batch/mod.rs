//! `$batch` requests
//!
//! A [`Batch`] is an ordered list of slots. Each slot is either one request
//! or a [`Changeset`] of write requests submitted as a unit. Whether the
//! server applies a changeset atomically is up to the server; the client only
//! keeps requests and responses aligned.

pub mod request;
pub mod response;

use rand::Rng;

use crate::error::BatchPartError;
use crate::query::{ODataRequest, Outcome};

pub use response::BatchResponseParser;

/// Random id of the form `dddd_dddd_dddd`
fn generate_id() -> String {
    let mut rng = rand::rng();
    format!(
        "{}_{}_{}",
        rng.random_range(1000..10000),
        rng.random_range(1000..10000),
        rng.random_range(1000..10000)
    )
}

/// Write requests submitted together inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    id: String,
    requests: Vec<ODataRequest>,
}

impl Default for Changeset {
    fn default() -> Self {
        Self::new()
    }
}

impl Changeset {
    pub fn new() -> Self {
        Self::with_id(generate_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requests: Vec::new(),
        }
    }

    /// Append a request; it gets `Content-ID` equal to its 1-based position,
    /// so later requests may reference it as `$n`
    pub fn request(mut self, request: ODataRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requests(&self) -> &[ODataRequest] {
        &self.requests
    }

    pub fn boundary(&self) -> String {
        format!("changeset_{}", self.id)
    }
}

/// One slot of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItem {
    Request(ODataRequest),
    Changeset(Changeset),
}

/// An ordered batch of requests and changesets
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: String,
    items: Vec<BatchItem>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self::with_id(generate_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
        }
    }

    pub fn request(mut self, request: ODataRequest) -> Self {
        self.items.push(BatchItem::Request(request));
        self
    }

    pub fn changeset(mut self, changeset: Changeset) -> Self {
        self.items.push(BatchItem::Changeset(changeset));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn boundary(&self) -> String {
        format!("batch_{}", self.id)
    }
}

/// Result of one request inside a batch
pub type PartResult = std::result::Result<Outcome, BatchPartError>;

/// Result of one batch slot, in the order the slots were added
#[derive(Debug, Clone, PartialEq)]
pub enum SlotResult {
    Single(PartResult),
    /// Per-request results, or one error when the server rejected the whole changeset
    Changeset(std::result::Result<Vec<PartResult>, BatchPartError>),
}

impl SlotResult {
    pub fn is_ok(&self) -> bool {
        match self {
            SlotResult::Single(result) => result.is_ok(),
            SlotResult::Changeset(Ok(results)) => results.iter().all(Result::is_ok),
            SlotResult::Changeset(Err(_)) => false,
        }
    }

    pub fn into_single(self) -> Option<PartResult> {
        match self {
            SlotResult::Single(result) => Some(result),
            SlotResult::Changeset(_) => None,
        }
    }

    pub fn into_changeset(self) -> Option<std::result::Result<Vec<PartResult>, BatchPartError>> {
        match self {
            SlotResult::Changeset(results) => Some(results),
            SlotResult::Single(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_generated_boundaries() {
        let pattern = Regex::new(r"^batch_\d{4}_\d{4}_\d{4}$").unwrap();
        assert!(pattern.is_match(&Batch::new().boundary()));
        assert_eq!(Changeset::with_id("1").boundary(), "changeset_1");
        assert!(Batch::default().is_empty());
    }
}
