pub mod auth;
pub mod logging;

pub use auth::ApiTokenAuth;
pub use logging::request_logger;
