//! # firebase-auth-kit
//!
//! Progressive identity for apps that start every user in an anonymous
//! Firebase session. The kit upgrades that session to Sign in with Apple,
//! Google or email/password without losing the anonymous `uid`, and falls back
//! to signing in when the credential already belongs to another account.
//!
//! ```no_run
//! use std::sync::Arc;
//! use firebase_auth_kit::auth::{AuthKit, AuthorizationPresenter};
//!
//! # async fn run(presenter: Arc<dyn AuthorizationPresenter>) -> firebase_auth_kit::auth::AuthKitResult<()> {
//! let kit = AuthKit::install_shared(Arc::new(
//!     AuthKit::builder().with_api_key("my-api-key").build()?,
//! ))?;
//! kit.configure_presenter(move || Some(Arc::clone(&presenter)));
//!
//! kit.sign_in_anonymously().await?;
//! match kit.upgrade_to_apple().await {
//!     Ok(outcome) => println!("signed in as {}", outcome.identity.uid),
//!     Err(err) if err.is_user_cancellation() => {}
//!     Err(err) => eprintln!("{err}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod logger;
pub mod platform;
pub mod storage;
pub mod util;

#[cfg(test)]
pub mod test_support;
