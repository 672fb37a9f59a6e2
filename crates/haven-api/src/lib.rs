pub mod auth;
pub mod messages;
pub mod middleware;
pub mod realms;
