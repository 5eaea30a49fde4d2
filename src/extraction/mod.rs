//! Address extraction pipeline: records in, structured address fields merged back.

mod pipeline;
pub mod types;

pub use pipeline::{
    ExtractionError, ExtractionPipeline, ExtractionReport, address_schema, build_extraction_prompt,
};
pub use types::{AddressField, AddressFields, Record, UnknownField, sample_records};
