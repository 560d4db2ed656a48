pub mod alarms;
pub mod config;
pub mod geo;
pub mod geocode;
pub mod model;
pub mod notify;
pub mod position;
pub mod session;
