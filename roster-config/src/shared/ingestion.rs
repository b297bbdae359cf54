use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Bulk CSV ingestion settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestionConfig {
    /// Parsed rows accumulated before they are flushed to the command queue.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Parsed rows the reader may run ahead of the accumulator.
    ///
    /// The reader blocks once this many rows are waiting, which bounds memory together
    /// with `batch_size`.
    #[serde(default = "default_row_buffer")]
    pub row_buffer: usize,
}

impl IngestionConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    pub const DEFAULT_ROW_BUFFER: usize = 10;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::invalid(
                "ingestion.batch_size",
                "must be greater than 0",
            ));
        }

        if self.row_buffer == 0 {
            return Err(ValidationError::invalid(
                "ingestion.row_buffer",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            row_buffer: default_row_buffer(),
        }
    }
}

fn default_batch_size() -> usize {
    IngestionConfig::DEFAULT_BATCH_SIZE
}

fn default_row_buffer() -> usize {
    IngestionConfig::DEFAULT_ROW_BUFFER
}
