//! Unit tests module organization

mod pricing;
mod registry;
mod routes;
