pub mod county;
pub mod io;
pub mod join;
pub mod model;
pub mod overrides;
pub mod params;
pub mod resolver;
pub mod sample;
pub mod tables;

pub use crate::county::normalize_county_name;
pub use crate::io::InputError;
pub use crate::join::{area_costs, broadcast, check_consistency, AreaCosts, ConsistencyReport};
pub use crate::model::{
    AreaKey, CostedMapping, CountyReferenceRecord, MatchKey, RatingAreaMapping, RatingAreaRule,
    UnmatchedRecord,
};
pub use crate::overrides::OverrideTable;
pub use crate::params::{merge_costs, MergeReport, ParamFile};
pub use crate::resolver::{resolve, MatchStats, Resolution, ResolverOptions};
pub use crate::sample::{representative_zips, RepresentativeZip};
pub use crate::tables::{parse_rating_area_table, TableEntry};
