pub mod config;
pub mod engines;
pub mod generators;
pub mod signals;
