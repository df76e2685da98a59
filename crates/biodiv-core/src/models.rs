pub mod filter;
pub mod geometry;
pub mod layer;
pub mod study_area;

pub use filter::{FilterSelection, Period, TaxonomicRank};
pub use geometry::{Crs, GeometryKind};
pub use layer::{ColumnInfo, LayerSource, LayerState, OutputMode, ResultLayer, ResultSet};
pub use study_area::{StudyArea, StudyFeature};
