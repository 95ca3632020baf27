#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::collapsible_if,
         clippy::collapsible_else_if, clippy::manual_range_contains, clippy::comparison_chain,
         clippy::float_cmp, clippy::needless_range_loop, clippy::type_complexity,
         clippy::unnecessary_map_or)]

pub mod q_shared;
pub mod common;
pub mod error;
pub mod cvar;
pub mod poly;
pub mod bsp_model;
pub mod reach_spec;
pub mod level;
pub mod prefab;
