//! Report generation for the rendering layer.

pub mod generator;

pub use generator::*;
