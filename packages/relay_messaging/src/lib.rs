pub mod errors;
pub mod health;
pub mod metrics;
pub mod model;
pub mod ports;
pub mod probes;
pub mod queue;
pub mod services;

#[cfg(test)]
mod tests;
