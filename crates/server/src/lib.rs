/// REST API: router, handlers, errors and metrics.
pub mod api;
