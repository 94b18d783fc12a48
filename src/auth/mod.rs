//! Credential cookies carried by incoming requests.
//!
//! The gateway never decodes credentials. It only reads which of the pair is
//! present, forwards the raw `Cookie` header to the identity backend, and
//! clears both cookies when a protected request cannot be authenticated.

mod cookie;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, append_clear_cookies, clear_cookie, get_cookie,
};
pub use types::Credentials;
