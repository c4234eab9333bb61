pub mod delegation;
pub mod etl;
pub mod extractor;
pub mod merger;
pub mod pipeline;
pub mod tables;

pub use crate::domain::model::{ExtractResult, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
