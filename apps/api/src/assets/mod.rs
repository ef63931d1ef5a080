pub mod handlers;
pub mod keys;
pub mod metadata;
pub mod quota;
pub mod upload;
