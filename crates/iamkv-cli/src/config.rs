use std::path::Path;

use anyhow::Context;
use iamkv_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// Which service the CLI stores records in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local model of the service; contents vanish on exit.
    #[default]
    Memory,
    /// AWS IAM (requires the `aws` feature).
    Aws,
}

/// Connection settings for the AWS backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region override; the SDK's default chain applies when unset.
    pub region: Option<String>,
    /// Custom endpoint, e.g. a local IAM emulator.
    pub endpoint: Option<String>,
}

/// Contents of the `--config` file.
///
/// ```toml
/// backend = "aws"
///
/// [store]
/// primary_prefix = "kv-u-"
/// secondary_prefix = "kv-r-"
///
/// [aws]
/// region = "us-east-1"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub backend: BackendKind,
    pub store: StoreConfig,
    pub aws: AwsConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.store.validate()?;
        Ok(config)
    }
}
