use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{
    HandlerConfig, ListenerConfig, PoolConfig, SourceConfig, ValidationError, WatchedTable,
};

/// Complete startup configuration of the streaming core.
///
/// Built once at startup and shared read-only with every component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamingConfig {
    #[serde(default)]
    pub handlers: HandlerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    /// One entry per watched table.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl StreamingConfig {
    /// Validates every section and checks each watched table is configured exactly once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.handlers.validate()?;
        self.pool.validate(self.handlers.count)?;
        self.listener.validate()?;

        for table in WatchedTable::ALL {
            let mut matching = self.sources.iter().filter(|source| source.table == table);
            match (matching.next(), matching.next()) {
                (None, _) => return Err(ValidationError::MissingSource(table.to_string())),
                (Some(_), Some(_)) => {
                    return Err(ValidationError::DuplicateSource(table.to_string()));
                }
                (Some(source), None) => source.validate()?,
            }
        }

        Ok(())
    }

    /// Returns the configuration of one watched table, if present.
    pub fn source(&self, table: WatchedTable) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.table == table)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            handlers: HandlerConfig::default(),
            pool: PoolConfig::default(),
            listener: ListenerConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Config for StreamingConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_sources() -> Vec<SourceConfig> {
    WatchedTable::ALL.into_iter().map(SourceConfig::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StreamingConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.handlers.accumulator_size_bits, 18);
        assert_eq!(
            config
                .source(WatchedTable::ContainerStatus)
                .unwrap()
                .poll_timeout_ms,
            10
        );
    }

    #[test]
    fn zero_handlers_is_rejected() {
        let mut config = StreamingConfig::default();
        config.handlers.count = 0;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "handlers.count"
        ));
    }

    #[test]
    fn pool_smaller_than_sentinels_is_rejected() {
        let mut config = StreamingConfig::default();
        config.handlers.count = 4;
        config.pool.capacity = 8;

        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_and_duplicate_sources_are_rejected() {
        let mut config = StreamingConfig::default();
        config.sources.retain(|source| source.table != WatchedTable::Resource);
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingSource("resource".to_string()))
        );

        let mut config = StreamingConfig::default();
        config.sources.push(SourceConfig::new(WatchedTable::RmNode));
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateSource("rm_node".to_string()))
        );
    }

    #[test]
    fn deserializes_with_defaults_for_missing_sections() {
        let config: StreamingConfig =
            serde_json::from_str(r#"{"handlers": {"count": 3}}"#).unwrap();

        assert_eq!(config.handlers.count, 3);
        assert_eq!(
            config.handlers.accumulator_size_bits,
            HandlerConfig::DEFAULT_ACCUMULATOR_SIZE_BITS
        );
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.sources.len(), 5);
    }
}
