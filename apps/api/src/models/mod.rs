pub mod asset;
pub mod resume;
