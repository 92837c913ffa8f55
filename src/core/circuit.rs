use crate::core::int_format::IntFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One editable input of the circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    pub bits: u8,
    #[serde(default)]
    pub supports_high_z: bool,
    #[serde(default)]
    pub format: IntFormat,
    #[serde(default)]
    pub default: u64,
}

impl InputConfig {
    pub fn new(name: &str, bits: u8) -> Self {
        Self {
            name: name.to_string(),
            bits,
            supports_high_z: false,
            format: IntFormat::Def,
            default: 0,
        }
    }

    pub fn with_format(mut self, format: IntFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_high_z(mut self) -> Self {
        self.supports_high_z = true;
        self
    }

    pub fn with_default(mut self, default: u64) -> Self {
        self.default = default;
        self
    }
}

/// The set of inputs exposed by the simulated circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub inputs: Vec<InputConfig>,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self::demo()
    }
}

impl CircuitConfig {
    /// Location of the user's circuit description
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bitdial").join("circuit.json"))
    }

    /// Built-in inputs used when no circuit file is present
    pub fn demo() -> Self {
        Self {
            inputs: vec![
                InputConfig::new("EN", 1),
                InputConfig::new("SEL", 3).with_format(IntFormat::Dec),
                InputConfig::new("DATA", 8).with_high_z().with_default(0x5A),
                InputConfig::new("CHAR", 8).with_format(IntFormat::Ascii).with_default(0x41),
                InputConfig::new("OFFSET", 16).with_format(IntFormat::DecSigned),
                InputConfig::new("ADDR", 32)
                    .with_format(IntFormat::Hex)
                    .with_default(0x0000_1000),
                InputConfig::new("REAL", 32)
                    .with_format(IntFormat::Float)
                    .with_default(1.0f32.to_bits() as u64),
                InputConfig::new("WIDE", 64).with_format(IntFormat::Bin),
            ],
        }
    }

    /// Parse and validate a circuit description
    pub fn parse(json: &str) -> Result<Self> {
        let config: CircuitConfig =
            serde_json::from_str(json).context("Failed to parse circuit description")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a circuit description from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid circuit file {}", path.display()))
    }

    /// Load the user's circuit, falling back to the demo inputs
    pub fn load_or_default() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::demo();
        };
        if !path.exists() {
            tracing::debug!("No circuit file at {}, using demo inputs", path.display());
            return Self::demo();
        }
        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded {} inputs from {}", config.inputs.len(), path.display());
                config
            }
            Err(e) => {
                tracing::warn!("{:#}; using demo inputs", e);
                Self::demo()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                anyhow::bail!("Input names must not be empty");
            }
            if !(1..=64).contains(&input.bits) {
                anyhow::bail!("Input '{}' has {} bits, expected 1 to 64", input.name, input.bits);
            }
            if !names.insert(input.name.as_str()) {
                anyhow::bail!("Duplicate input name '{}'", input.name);
            }
        }
        Ok(())
    }
}
