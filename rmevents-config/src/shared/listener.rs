use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Listener thread configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListenerConfig {
    /// Upper bound of row changes taken from one source in a single poll.
    #[serde(default = "default_max_events_per_poll")]
    pub max_events_per_poll: usize,
}

impl ListenerConfig {
    /// Default number of row changes taken per poll.
    pub const DEFAULT_MAX_EVENTS_PER_POLL: usize = 256;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_events_per_poll == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "listener.max_events_per_poll".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_events_per_poll: default_max_events_per_poll(),
        }
    }
}

fn default_max_events_per_poll() -> usize {
    ListenerConfig::DEFAULT_MAX_EVENTS_PER_POLL
}
