// levelbake-paths — Scout tours, path node placement and reach specs

#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::collapsible_if,
         clippy::collapsible_else_if, clippy::float_cmp, clippy::needless_range_loop,
         clippy::unnecessary_map_or)]

pub mod pb_scout;
pub mod box_world;
pub mod pb_marker;
pub mod pb_wall;
pub mod pb_merge;
pub mod pb_reach;
pub mod pb_main;

pub use pb_main::{build_paths, define_paths, remove_paths, undefine_paths, PathBuildOptions, PathBuildStats};
pub use pb_scout::{MoveOracle, Scout};
