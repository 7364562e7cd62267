use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Handler thread configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HandlerConfig {
    /// Number of handler threads. Correlation ids are sharded over them.
    #[serde(default = "default_handler_count")]
    pub count: usize,
    /// Log2 of the number of direct slots in each handler's accumulator table.
    #[serde(default = "default_accumulator_size_bits")]
    pub accumulator_size_bits: u32,
}

impl HandlerConfig {
    /// Default number of handler threads.
    pub const DEFAULT_COUNT: usize = 4;

    /// Default accumulator table size, 2^18 slots.
    pub const DEFAULT_ACCUMULATOR_SIZE_BITS: u32 = 18;

    /// Largest accepted accumulator table size.
    pub const MAX_ACCUMULATOR_SIZE_BITS: u32 = 28;

    /// Ensures the handler count is non-zero and the table size is in range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "handlers.count".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.count > u16::MAX as usize {
            return Err(ValidationError::InvalidFieldValue {
                field: "handlers.count".to_string(),
                constraint: format!("must be at most {}", u16::MAX),
            });
        }

        if self.accumulator_size_bits == 0
            || self.accumulator_size_bits > Self::MAX_ACCUMULATOR_SIZE_BITS
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "handlers.accumulator_size_bits".to_string(),
                constraint: format!("must be between 1 and {}", Self::MAX_ACCUMULATOR_SIZE_BITS),
            });
        }

        Ok(())
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            count: default_handler_count(),
            accumulator_size_bits: default_accumulator_size_bits(),
        }
    }
}

fn default_handler_count() -> usize {
    HandlerConfig::DEFAULT_COUNT
}

fn default_accumulator_size_bits() -> u32 {
    HandlerConfig::DEFAULT_ACCUMULATOR_SIZE_BITS
}
