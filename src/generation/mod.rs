//! Image generation, editing and variations.
//!
//! Nothing here is cached: every call produces new images. Parameters are
//! checked against [`ModelSpec`] before any request leaves the process, and
//! each returned image is saved independently so one bad item does not sink
//! the batch.

pub mod dispatcher;
pub mod models;
pub mod output;

pub use dispatcher::{
    EditParams, GenerateParams, GenerationDispatcher, GenerationOutcome, ItemOutcome,
    VariationParams,
};
pub use models::{ImageModel, ImageRequestParams, ModelSpec, SourceRule};
pub use output::{
    list_images, GeneratedImageRecord, DEFAULT_EDITED_DIR, DEFAULT_GENERATED_DIR,
    DEFAULT_VARIATIONS_DIR,
};
