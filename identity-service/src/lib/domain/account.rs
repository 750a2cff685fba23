pub mod errors;
pub mod kind;
pub mod models;
pub mod notifications;
pub mod ports;
pub mod service;
pub mod session;
