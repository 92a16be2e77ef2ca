pub mod config;
pub mod format;
pub mod model;
pub mod normalize;
pub mod preset;
pub mod schema;
pub mod table;
pub mod template;
