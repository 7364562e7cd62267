use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Message pool configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Number of message objects preallocated for the whole run.
    ///
    /// Fragments that arrive while every object is in circulation are dropped.
    #[serde(default = "default_pool_capacity")]
    pub capacity: usize,
}

impl PoolConfig {
    /// Default number of preallocated message objects.
    pub const DEFAULT_CAPACITY: usize = 16384;

    /// Ensures the pool can hold the queue sentinels with room to spare.
    pub fn validate(&self, handler_count: usize) -> Result<(), ValidationError> {
        // One inbound and one return sentinel per handler.
        let minimum = handler_count * 2 + 1;
        if self.capacity < minimum {
            return Err(ValidationError::InvalidFieldValue {
                field: "pool.capacity".to_string(),
                constraint: format!("must be at least {minimum} for {handler_count} handlers"),
            });
        }

        if self.capacity >= u32::MAX as usize {
            return Err(ValidationError::InvalidFieldValue {
                field: "pool.capacity".to_string(),
                constraint: format!("must be below {}", u32::MAX),
            });
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_pool_capacity(),
        }
    }
}

fn default_pool_capacity() -> usize {
    PoolConfig::DEFAULT_CAPACITY
}
