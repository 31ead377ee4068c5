//! Service crate of the civic alerts pipeline: shared state, the cron and
//! health handlers, and their router.

pub mod app_state;
pub mod handlers;
pub mod routes;
