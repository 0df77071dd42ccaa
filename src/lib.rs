#![deny(clippy::uninlined_format_args)]
#![deny(clippy::to_string_in_format_args)]
//! Ranking index: keyed entities kept continuously ordered by score.
//!
//! [`RankMap`] pairs a hash index (key -> entity) with a score-ordered index
//! (score -> bucket of entities). Re-scoring an entity is a single
//! [`RankMap::upsert`]; rank, neighbour and full-order queries read the
//! ordered side.
//!
//! ```
//! use rankmap::{RankMap, Scored};
//!
//! let mut board: RankMap<Scored<u32, i64>> = RankMap::new();
//! board.upsert(Scored::new(1, 15));
//! board.upsert(Scored::new(2, 20));
//! board.upsert(Scored::new(1, 25));
//!
//! assert_eq!(board.rank_of(&1), Some(1));
//! assert_eq!(board.first_score(), Some(&25));
//! ```

pub mod config;
mod entry;
pub mod error;
pub mod format;
mod identity;
pub mod order;
mod order_index;
mod rank_map;

pub use config::{RankConfig, Stamp, StampSource};
pub use entry::{Ranked, Scored, Standing};
pub use error::{RankError, Result};
pub use identity::DefaultBuild;
pub use order::{Ascending, Descending, EarliestFirst, LatestFirst, ScoreOrder, TieBreak};
pub use rank_map::{Iter, RankMap};

/// Float scores ordered totally, for use as `Ranked::Score`.
pub type FloatScore = ordered_float::OrderedFloat<f64>;
