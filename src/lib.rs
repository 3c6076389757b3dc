pub mod config;
pub mod event;
pub mod metrics;
pub mod observer;
pub mod process;
pub mod properties;
pub mod web;
