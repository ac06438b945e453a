pub mod config;
pub mod feature;
pub mod geo;
