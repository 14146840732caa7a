pub mod analysis;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod matching;
pub mod models;
pub mod scoring;
pub mod text;
