//! The record index: the single ledger value listing every published report.
//!
//! The ledger has no enumeration primitive, so the set of reports is whatever
//! this list says it is. It is stored as a JSON array of identifier strings.
//! Appending is the only mutation; order is submission order as observed by
//! the writers, and identifiers never repeat.

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    codec::{CodecError, DecodeJsonSnafu, EncodeJsonSnafu, Utf8Snafu},
    record::RecordId,
};

/// Ordered list of record identifiers.
///
/// Indexes built locally through [`RecordIndex::append`] never repeat an
/// identifier. Values parsed from the ledger are kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordIndex(Vec<RecordId>);

impl RecordIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from identifiers, dropping repeats after their first occurrence.
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RecordId>,
    {
        let mut index = Self::new();
        for id in ids {
            index.append(id.into());
        }
        index
    }

    /// Appends `id` unless it is already present.
    ///
    /// Returns `false` when the identifier was already indexed.
    pub fn append(&mut self, id: RecordId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Returns true if `id` is indexed.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.0.iter().any(|existing| existing == id)
    }

    /// Number of indexed identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates identifiers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordId> {
        self.0.iter()
    }

    /// Returns the identifiers as a slice, in index order.
    pub fn ids(&self) -> &[RecordId] {
        &self.0
    }

    /// Parses the stored index value.
    ///
    /// A zero-length value means no index has been written yet and yields an
    /// empty index. Repeated identifiers in a stored value are preserved as
    /// written so that readers can report them; use [`Self::from_ids`] to
    /// normalise.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the value is not UTF-8 or not a JSON array of strings.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let text = std::str::from_utf8(bytes).context(Utf8Snafu)?;
        let ids: Vec<RecordId> = serde_json::from_str(text).context(DecodeJsonSnafu)?;
        Ok(Self(ids))
    }

    /// Serialises the index as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EncodeJson`] if serialisation fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&self.0).context(EncodeJsonSnafu)
    }
}

impl<'a> IntoIterator for &'a RecordIndex {
    type Item = &'a RecordId;
    type IntoIter = std::slice::Iter<'a, RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
