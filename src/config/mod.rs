mod settings;

use config::{Config, Environment, File};

use crate::utils::error::Result;

pub use settings::{BridgeSettings, LogSettings, PartialSettings, ServerSettings, Settings};

/// Loads the configuration from `config/default` (any format the `config`
/// crate understands) and `BROKER__*` environment variables, then merges the
/// result over the defaults.
///
/// `BROKER__SERVER__PORT=9000` overrides `server.port`.
pub fn load_config() -> Result<Settings> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("BROKER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests;
