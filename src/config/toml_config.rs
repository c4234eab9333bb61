use crate::config::{DEFAULT_OUTPUT_FILE, VALID_OUTPUT_FORMATS};
use crate::core::delegation::DEFAULT_DELEGATION_FILE;
use crate::core::merger::DEFAULT_SOURCE_EXTENSIONS;
use crate::core::tables::{DEFAULT_FIRST_PAGE, DEFAULT_TABLES_FILE};
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
    pub delegation: Option<DelegationConfig>,
    pub tables: Option<TablesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub input_dir: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// "compact" (default) or "json".
    pub log_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default = "default_delegation_file")]
    pub output_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_first_page")]
    pub first_page: usize,
    #[serde(default = "default_tables_file")]
    pub output_file: String,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            output_file: default_delegation_file(),
        }
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            first_page: default_first_page(),
            output_file: default_tables_file(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_output_file() -> String {
    DEFAULT_OUTPUT_FILE.to_string()
}

fn default_output_formats() -> Vec<String> {
    vec!["xlsx".to_string()]
}

fn default_delegation_file() -> String {
    DEFAULT_DELEGATION_FILE.to_string()
}

fn default_first_page() -> usize {
    DEFAULT_FIRST_PAGE
}

fn default_tables_file() -> String {
    DEFAULT_TABLES_FILE.to_string()
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables are left as is.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("source.input_dir", &self.source.input_dir)?;
        for extension in &self.source.extensions {
            validation::validate_non_empty_string("source.extensions", extension)?;
        }
        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_file_extensions(
            "load.output_file",
            std::slice::from_ref(&self.load.output_file),
            &["xlsx"],
        )?;
        validation::validate_one_of(
            "load.output_formats",
            &self.load.output_formats,
            &VALID_OUTPUT_FORMATS,
        )?;

        if let Some(compression) = self.load.compression.as_ref().filter(|c| c.enabled) {
            let filename =
                validation::validate_required_field("load.compression.filename", &compression.filename)?;
            validation::validate_file_extensions(
                "load.compression.filename",
                std::slice::from_ref(filename),
                &["zip"],
            )?;
        }

        if let Some(format) = self.monitoring.as_ref().and_then(|m| m.log_format.as_ref()) {
            validation::validate_one_of(
                "monitoring.log_format",
                std::slice::from_ref(format),
                &["compact", "json"],
            )?;
        }

        if let Some(delegation) = &self.delegation {
            validation::validate_file_extensions(
                "delegation.output_file",
                std::slice::from_ref(&delegation.output_file),
                &["xlsx"],
            )?;
        }

        if let Some(tables) = &self.tables {
            validation::validate_file_extensions(
                "tables.output_file",
                std::slice::from_ref(&tables.output_file),
                &["xlsx"],
            )?;
            validation::validate_range("tables.first_page", tables.first_page, 1, 100_000)?;
        }

        Ok(())
    }

    /// `[delegation]` settings, defaulted when the section is absent.
    pub fn delegation_settings(&self) -> DelegationConfig {
        self.delegation.clone().unwrap_or_default()
    }

    /// `[tables]` settings, defaulted when the section is absent.
    pub fn tables_settings(&self) -> TablesConfig {
        self.tables.clone().unwrap_or_default()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .map(|f| f == "json")
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_dir(&self) -> &str {
        &self.source.input_dir
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_file(&self) -> &str {
        &self.load.output_file
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn source_extensions(&self) -> &[String] {
        &self.source.extensions
    }

    fn bundle_name(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .and_then(|c| c.filename.as_deref())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
