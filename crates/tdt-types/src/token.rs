//! Tokenized document records produced by the external tokenizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::doc::{collection_key, CollectionKey};
use crate::error::TdtError;

/// Highest token position; the closing boundary arc sits one past it.
pub const MAX_POSITION: u32 = u32::MAX - 1;

/// One token and its position in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token text; `None` when the tokenizer could not resolve it
    #[serde(default)]
    pub text: Option<String>,
    /// Position in the document
    pub position: u32,
}

impl TokenRecord {
    /// A resolved token.
    pub fn word(text: impl Into<String>, position: u32) -> Self {
        Self {
            text: Some(text.into()),
            position,
        }
    }

    /// An unresolvable token.
    pub fn gap(position: u32) -> Self {
        Self {
            text: None,
            position,
        }
    }
}

/// A document as delivered by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedDocument {
    /// Original filename
    pub filename: String,
    /// Source the document came from
    pub source: String,
    /// Document date
    pub date: NaiveDate,
    /// Ordered tokens
    pub tokens: Vec<TokenRecord>,
}

impl TokenizedDocument {
    /// Collection key for this document.
    pub fn collection(&self) -> CollectionKey {
        collection_key(&self.source, self.date)
    }

    /// Check positions are strictly increasing and at most [`MAX_POSITION`].
    pub fn validate(&self) -> Result<(), TdtError> {
        if self.filename.is_empty() {
            return Err(TdtError::InvalidInput("document without filename".into()));
        }
        if let Some(last) = self.tokens.last().filter(|t| t.position > MAX_POSITION) {
            return Err(TdtError::InvalidInput(format!(
                "{}: token position {} out of range",
                self.filename, last.position
            )));
        }
        for pair in self.tokens.windows(2) {
            if pair[1].position <= pair[0].position {
                return Err(TdtError::InvalidInput(format!(
                    "{}: token positions not increasing at {}",
                    self.filename, pair[1].position
                )));
            }
        }
        Ok(())
    }

    /// Deserialize from JSON bytes and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TdtError> {
        let doc: TokenizedDocument = serde_json::from_slice(bytes)?;
        doc.validate()?;
        Ok(doc)
    }
}
