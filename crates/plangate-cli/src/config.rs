//! Configuration file management for plangate.
//!
//! Provides a TOML-based config file at `~/.config/plangate/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default. Every
//! field has a built-in default, so the service runs without a config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use plangate_core::pipeline::PipelineConfig;
use plangate_core::solver::SolverPaths;

// -----------------------------------------------------------------------
// Defaults
// -----------------------------------------------------------------------

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://finitech-sdp.github.io";
pub const DEFAULT_AGILE2014: &str = "solvers/agile2014/siw-then-bfsf";
pub const DEFAULT_BFWS: &str = "solvers/agile-balanced2018/bfws";
pub const DEFAULT_VALIDATOR: &str = "solvers/agile2014/validate";
pub const DEFAULT_SOLVER_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_VALIDATOR_TIMEOUT_SECS: u64 = 60;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub solvers: SolversSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    /// Origin allowed by the CORS layer.
    pub allowed_origin: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolversSection {
    pub agile2014: PathBuf,
    pub bfws: PathBuf,
    pub validator: PathBuf,
}

impl Default for SolversSection {
    fn default() -> Self {
        Self {
            agile2014: PathBuf::from(DEFAULT_AGILE2014),
            bfws: PathBuf::from(DEFAULT_BFWS),
            validator: PathBuf::from(DEFAULT_VALIDATOR),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub solver_timeout_secs: u64,
    pub validator_timeout_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            solver_timeout_secs: DEFAULT_SOLVER_TIMEOUT_SECS,
            validator_timeout_secs: DEFAULT_VALIDATOR_TIMEOUT_SECS,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plangate config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plangate` or
/// `~/.config/plangate`, ignoring the platform-specific config dir.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plangate");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plangate")
}

/// Return the path to the plangate config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config(path: &std::path::Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlangateConfig {
    pub bind: String,
    pub port: u16,
    pub allowed_origin: String,
    pub pipeline: PipelineConfig,
}

impl PlangateConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - bind/port: `--bind`/`--port` > `PLANGATE_BIND`/`PLANGATE_PORT` >
    ///   `[server]` section > defaults.
    /// - allowed origin: `PLANGATE_ALLOWED_ORIGIN` > `[server]` > default.
    /// - executable paths: `PLANGATE_AGILE2014_PATH` / `PLANGATE_BFWS_PATH` /
    ///   `PLANGATE_VALIDATOR_PATH` > `[solvers]` > defaults.
    /// - timeouts: `[limits]` > defaults.
    pub fn resolve(
        config_file: Option<&std::path::Path>,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
    ) -> Result<Self> {
        let file = match config_file {
            // An explicitly named config file must exist.
            Some(path) => Some(load_config(path)?),
            None => load_config(&config_path()).ok(),
        };
        let file = file.unwrap_or_default();

        let bind = cli_bind
            .map(str::to_owned)
            .or_else(|| std::env::var("PLANGATE_BIND").ok())
            .unwrap_or(file.server.bind);

        let port = match cli_port {
            Some(port) => port,
            None => match std::env::var("PLANGATE_PORT") {
                Ok(value) => value
                    .parse()
                    .context("PLANGATE_PORT env var is not a valid port number")?,
                Err(_) => file.server.port,
            },
        };

        let allowed_origin = std::env::var("PLANGATE_ALLOWED_ORIGIN")
            .unwrap_or(file.server.allowed_origin);

        let path_override = |env: &str, fallback: PathBuf| -> PathBuf {
            std::env::var(env).map(PathBuf::from).unwrap_or(fallback)
        };

        let pipeline = PipelineConfig {
            solver_paths: SolverPaths {
                agile2014: path_override("PLANGATE_AGILE2014_PATH", file.solvers.agile2014),
                bfws: path_override("PLANGATE_BFWS_PATH", file.solvers.bfws),
            },
            validator: path_override("PLANGATE_VALIDATOR_PATH", file.solvers.validator),
            solver_timeout: Duration::from_secs(file.limits.solver_timeout_secs),
            validator_timeout: Duration::from_secs(file.limits.validator_timeout_secs),
        };

        Ok(Self {
            bind,
            port,
            allowed_origin,
            pipeline,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
