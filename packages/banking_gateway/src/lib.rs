pub mod app;
pub mod config;
pub mod errors;
pub mod providers;
pub mod usecases;
