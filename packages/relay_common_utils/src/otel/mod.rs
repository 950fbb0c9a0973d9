pub mod initialiser;
pub mod metric_constants;
pub mod propagated_context;
