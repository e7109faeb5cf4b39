mod health;
mod login;

pub use health::health_handler;
pub use login::{request_code_handler, submit_code_handler, submit_password_handler};
