//! Credential redaction and SSRF protection for user-supplied links.

pub mod credentials;
pub mod url_guard;

pub use credentials::SecretString;
pub use url_guard::UrlGuard;
