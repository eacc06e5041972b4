pub mod staging;
pub mod builder;
