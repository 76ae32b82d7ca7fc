//! Fulcrum - HTTP reverse-proxy load balancer
//!
//! This library provides the backend pool, the selection strategies, active
//! health checking and the request dispatcher that relays client traffic to
//! the chosen backend.

pub mod balancer;
pub mod cli;
pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod routing;
