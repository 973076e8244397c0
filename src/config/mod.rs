mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{LogSettings, ServerSettings, Settings};

/// Loads the configuration from the optional `config/default` file and
/// `APP_`-prefixed environment variables, then merges it onto the defaults.
///
/// Nested keys use `__`, e.g. `APP_SERVER__PORT=9000` or `APP_LOG__LEVEL=debug`.
/// The flat `APP_PORT`, `APP_LOG_LEVEL` and `APP_STATIC_PATH` are accepted too.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests;
