pub mod fingerprint;
pub mod handlers;
pub mod middleware;
pub mod router;
