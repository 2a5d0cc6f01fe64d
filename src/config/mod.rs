mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, RedisSettings, ServerSettings, Settings};

/// Prefix of the environment variables that override file settings,
/// e.g. `STREAMHUB_REDIS__HOST`.
pub const ENV_PREFIX: &str = "STREAMHUB";

/// Loads the configuration from the default files, an optional explicit
/// file and environment variables, then fills the gaps with defaults.
///
/// Sources, lowest precedence first:
/// - `config/default.*`
/// - `config/streaming-api.*`
/// - `path`, when given (must exist)
/// - `STREAMHUB_*` environment variables, `__` separating nested keys
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/streaming-api").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_defaults())
}

#[cfg(test)]
mod tests;
