use serde::{Deserialize, Serialize};
use super::data_type::DataType;

/// A column of a foreign relation as declared in the host catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    /// Dropped columns keep their slot in the row but are never sent to the remote.
    #[serde(default)]
    pub dropped: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            dropped: false,
        }
    }

    #[must_use]
    pub fn dropped(mut self) -> Self {
        self.dropped = true;
        self
    }
}
