pub mod authentication;
pub mod config;
pub mod routes;
pub mod startup;
pub mod validation;
