//! Domain value objects

pub mod breadcrumb;
pub mod byte_range;
pub mod fit_mode;
pub mod output_format;
pub mod quality_level;
pub mod time_value;
pub mod transform_mode;
pub mod transform_options;

pub use breadcrumb::{Breadcrumb, BreadcrumbRing, DEFAULT_BREADCRUMB_CAPACITY};
pub use byte_range::{unsatisfiable_content_range, ByteRange, RangeNotSatisfiable};
pub use fit_mode::FitMode;
pub use output_format::OutputFormat;
pub use quality_level::QualityLevel;
pub use time_value::TimeValue;
pub use transform_mode::TransformMode;
pub use transform_options::TransformOptions;
