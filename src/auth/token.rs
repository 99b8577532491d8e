//! Token secrets, persisted records, and normalized grant responses.

pub mod grant;
pub mod record;
pub mod secret;
