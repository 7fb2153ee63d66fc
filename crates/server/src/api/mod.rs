//! JSON endpoints, grouped by resource.

mod consolidations;
mod health;
mod reference;
mod reports;
mod submissions;

pub use consolidations::consolidation_routes;
pub use health::health_routes;
pub use reference::reference_routes;
pub use reports::report_routes;
pub use submissions::submission_routes;
