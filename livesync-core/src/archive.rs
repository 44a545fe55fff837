//! Immutable packed snapshot of a workspace.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read as _};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::CodecError;

/// A packed archive: the single-blob form of a workspace.
///
/// Cloning is cheap; the bytes are shared and never mutated once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Archive {
    packed: Arc<[u8]>,
}

impl Archive {
    /// Wrap already-packed container bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            packed: Arc::from(bytes.into()),
        }
    }

    /// Decode a base64 payload received from a host process.
    pub fn from_base64(payload: &str) -> Result<Self, CodecError> {
        Ok(Self::from_bytes(STANDARD.decode(payload.trim())?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.packed
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.packed.to_vec()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.packed)
    }

    pub fn len(&self) -> usize {
        self.packed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }

    /// The path → bytes mapping held by this archive, directories excluded.
    pub fn entries(&self) -> Result<BTreeMap<String, Vec<u8>>, CodecError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(self.as_bytes()))?;
        let mut entries = BTreeMap::new();
        for index in 0..zip.len() {
            let mut file = zip.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| crate::error::io_err(&name, e))?;
            entries.insert(name, content);
        }
        Ok(entries)
    }

    /// Two archives are interchangeable when their entry mappings match,
    /// regardless of container-level details such as compression.
    pub fn same_contents(&self, other: &Archive) -> Result<bool, CodecError> {
        if self == other {
            return Ok(true);
        }
        Ok(self.entries()? == other.entries()?)
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("bytes", &self.packed.len())
            .finish()
    }
}

impl From<Vec<u8>> for Archive {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}
