//! Remote CRM access over HTTP.

mod client;
mod oauth;

pub use client::{CrmClient, EntityFetcher, INVALID_TOKEN_CODE};
pub use oauth::OAuthCredentialProvider;
