pub mod assemble;
pub mod handlers;
