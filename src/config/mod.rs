pub mod load;
pub mod types;

pub use load::validate_skip_percentages;
pub use types::{
    COLORS_MAX, COLORS_MIN, ConfigLayer, FileTypeTable, GridRule, MissingFramePolicy,
    MontageConfig, OutputFormat, default_grid_rules,
};
