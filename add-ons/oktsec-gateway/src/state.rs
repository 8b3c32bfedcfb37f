use oktsec_audit::Hub;
use oktsec_policy::PolicyPipeline;
use std::sync::Arc;

/// Shared handle passed into every axum handler. Cloning is cheap — every
/// field is already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PolicyPipeline>,
    pub hub: Arc<Hub>,
}
