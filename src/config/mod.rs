//! Configuration for runkit instances.
//!
//! The config is a YAML file (`{profile}.yaml`) inside the instance
//! directory. Parsing is forward-compatible (unknown fields are ignored),
//! every field has a default, and values are validated after loading.

mod model;
mod operations;


pub use model::Config;
