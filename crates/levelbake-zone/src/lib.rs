// levelbake-zone — portals, zones, visibility and bounds for a BSP level

#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::collapsible_if,
         clippy::collapsible_else_if, clippy::needless_range_loop, clippy::float_cmp)]

pub mod zb_portal;
pub mod zb_zone;
pub mod zb_vis;
pub mod zb_bounds;
pub mod zb_main;

pub use zb_main::{build_zones, ZoneBuildOptions, ZoneBuildStats};
