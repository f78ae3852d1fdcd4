#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod connectivity;
pub mod gps_processor;
pub mod history;
pub mod location_source;
pub mod logs;
pub mod main_db;
pub mod permission;
pub mod route_log;
pub mod session;
pub mod storage;
pub mod throttle;
mod utils;
