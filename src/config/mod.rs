mod settings;

use config::{Config, Environment, File};

use crate::utils::RelayError;

pub use settings::{
    BrokerSettings, ConsumerSettings, DisplaySettings, PartialSettings, ServerSettings, Settings,
};

/// Loads configuration from `config/default.*`, a `.env` file and the
/// process environment, in increasing priority.
///
/// Environment keys are prefixed with `RELAY_` and nested with `__`, e.g.
/// `RELAY_SERVER__PORT=4000` or `RELAY_BROKER__URL=ws://broker:8080`.
pub fn load_config() -> Result<Settings, RelayError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}
