pub mod datasets;
pub mod error;
pub mod generator;
pub mod ingest_mode;
pub mod lock;
pub mod metadata;
pub mod sink;
pub mod sqldom;
pub mod strategy;
pub mod validation;

pub use generator::{Clock, GeneratorOptions, GeneratorResult, RelationalGenerator, Resources};
pub use strategy::StatisticName;

pub mod prelude {
    pub use crate::datasets::*;
    pub use crate::error::*;
    pub use crate::generator::*;
    pub use crate::ingest_mode::*;
    pub use crate::metadata::MetadataDataset;
    pub use crate::sink::Dialect;
    pub use crate::sqldom::render::CaseConversion;
    pub use crate::strategy::StatisticName;
}
