// ABOUTME: Orchestrator module for routing queries to single workers or multi-step plans.
// ABOUTME: Contains types, classifier, router, planner, validation, executor and worker adapters.

pub mod chat_model_worker;
pub mod classifier;
pub mod executor;
pub mod gateway;
pub mod planner;
pub mod router;
pub mod service;
pub mod types;
pub mod validation;
pub mod worker;
