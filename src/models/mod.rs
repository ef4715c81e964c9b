pub mod assignment;
pub mod audit;
pub mod fleet;
