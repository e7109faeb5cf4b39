// ForGifts account-login service.
//
// Drives the multi-step Telegram account login flow (phone -> one-time code
// -> optional cloud password -> durable session record) on behalf of the
// front end. The MTProto transport itself lives behind the telegram-auth
// bridge client.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
