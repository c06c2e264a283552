#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod transform;
