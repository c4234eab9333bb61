pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub const VALID_OUTPUT_FORMATS: [&str; 3] = ["xlsx", "csv", "json"];
pub const DEFAULT_OUTPUT_FILE: &str = "contributions_2000-2016.xlsx";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "contrib-etl")]
#[command(about = "Merge yearly UN contribution workbooks into one table")]
pub struct CliConfig {
    /// Directory with one workbook per reporting year
    #[arg(long, default_value = "excel_outputs")]
    pub input_dir: String,

    #[arg(long, default_value = ".")]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: String,

    /// Output formats: xlsx, csv, json
    #[arg(long, value_delimiter = ',', default_value = "xlsx")]
    pub formats: Vec<String>,

    /// Source file extensions to pick up from the input directory
    #[arg(long, value_delimiter = ',', default_value = "xlsx")]
    pub extensions: Vec<String>,

    /// Write every output into this zip archive instead of loose files
    #[arg(long)]
    pub bundle: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_dir(&self) -> &str {
        &self.input_dir
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_file(&self) -> &str {
        &self.output_file
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn source_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn bundle_name(&self) -> Option<&str> {
        self.bundle.as_deref()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input_dir", &self.input_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_file_extensions(
            "output_file",
            std::slice::from_ref(&self.output_file),
            &["xlsx"],
        )?;
        validation::validate_one_of("formats", &self.formats, &VALID_OUTPUT_FORMATS)?;
        for extension in &self.extensions {
            validation::validate_non_empty_string("extensions", extension)?;
        }
        if let Some(bundle) = &self.bundle {
            validation::validate_file_extensions("bundle", std::slice::from_ref(bundle), &["zip"])?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = CliConfig::parse_from(["contrib-etl"]);
        assert_eq!(config.input_dir, "excel_outputs");
        assert_eq!(config.output_file, DEFAULT_OUTPUT_FILE);
        assert_eq!(config.formats, vec!["xlsx"]);
        assert_eq!(config.extensions, vec!["xlsx"]);
        assert!(config.bundle_name().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let config = CliConfig::parse_from(["contrib-etl", "--formats", "xlsx,parquet"]);
        assert_eq!(config.formats, vec!["xlsx", "parquet"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_bundle_must_be_zip() {
        let config = CliConfig::parse_from(["contrib-etl", "--bundle", "out.tar"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["contrib-etl", "--bundle", "out.zip"]);
        assert!(config.validate().is_ok());
    }
}
