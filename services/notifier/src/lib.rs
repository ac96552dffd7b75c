pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod web;
