pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{cli::LocalStorage, toml_config::TomlConfig};

pub use crate::adapters::CalamineReader;
pub use crate::core::delegation::DelegationPipeline;
pub use crate::core::etl::EtlEngine;
pub use crate::core::merger::{merge, ContributionMerger};
pub use crate::core::pipeline::ContributionsPipeline;
pub use crate::core::tables::TableExport;
pub use crate::domain::model::{ContributionRecord, MergedDataset};
pub use crate::utils::error::{EtlError, Result};
