//! Star SED Common Library
//!
//! CLIと索引ツールで共有される型と照合アルゴリズム（ファイルIOを含まない）

pub mod error;
pub mod extinction;
pub mod format;
pub mod index;
pub mod kdtree;
pub mod matcher;
pub mod parser;
pub mod photometry;
pub mod population;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
pub use extinction::{
    icrs_to_galactic, AppliedExtinction, DustMap, ExponentialDisk, ExtinctionMode,
    ExtinctionModel, ExtinctionPolicy, ExtinctionSource, GalacticCoords, DEFAULT_R_V,
};
pub use format::{format_g, format_g9, LineFormat, PlaceholderPolicy};
pub use index::{Candidate, SpectralIndex};
pub use kdtree::{KdTree, Neighbor};
pub use matcher::{MatchOptions, SedMatcher};
pub use parser::{parse_star_line, AngleUnit, DistanceUnit, InputColumns, InvalidLine, ParsedLine};
pub use photometry::{Band, Color, ColorVector, Photometry, COLOR_COUNT};
pub use population::{Population, PopulationRouter, PopulationRule};
pub use stats::RunStatistics;
pub use types::{
    MatchResult, MatchStatus, PhysicalParams, SkyPosition, SpectralTemplate, StarRecord,
    TemplateId,
};
