//! iCloud authentication
//!
//! [`authenticate`] signs in and, when the account asks for a verification
//! code, obtains one from the operator through a [`Prompter`].

pub mod session;
pub mod trust_store;

pub use session::{Challenge, ICloudSession};
pub use trust_store::{TrustStore, TrustToken};

use crate::config::ICloudConfig;
use crate::error::Result;
use crate::prompt::Prompter;

/// Sign in and complete any pending 2FA/2SA challenge
///
/// # Errors
///
/// Returns an error if the credentials are missing or rejected, the code
/// cannot be read, or the service refuses the code.
pub async fn authenticate(
    config: &ICloudConfig,
    prompter: &mut dyn Prompter,
) -> Result<ICloudSession> {
    let mut session = ICloudSession::login(config).await?;

    if let Some(challenge) = session.challenge() {
        session.prepare_challenge().await?;
        println!("{}", challenge.notice());
        let code = prompter.ask(&challenge.prompt())?;
        session.resolve_challenge(code.trim()).await?;
    }

    Ok(session)
}
