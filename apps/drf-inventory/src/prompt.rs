//! Credential source for interactive runs.
//!
//! `DRF_INVENTORY_USERNAME` / `DRF_INVENTORY_PASSWORD` win when set, so the
//! binary stays usable from CI. Otherwise the user is asked on the terminal.
//! Prompts only happen when the token lifecycle actually needs a login.

use std::sync::Mutex;

use dialoguer::{theme::ColorfulTheme, Input, Password};
use drf_sync::{CredentialProvider, Credentials, SyncError, SyncResult};
use secrecy::SecretString;

pub const USERNAME_ENV: &str = "DRF_INVENTORY_USERNAME";
pub const PASSWORD_ENV: &str = "DRF_INVENTORY_PASSWORD";

#[derive(Default)]
pub struct PromptCredentials {
    // Remembered so a re-login in the same run does not prompt twice.
    answered: Mutex<Option<Credentials>>,
}

impl PromptCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    fn ask(&self) -> SyncResult<Credentials> {
        let theme = ColorfulTheme::default();
        let username = match std::env::var(USERNAME_ENV) {
            Ok(username) => username,
            Err(_) => Input::<String>::with_theme(&theme)
                .with_prompt("Username")
                .interact_text()
                .map_err(|e| SyncError::Credentials(e.to_string()))?,
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) => password,
            Err(_) => Password::with_theme(&theme)
                .with_prompt("Password")
                .interact()
                .map_err(|e| SyncError::Credentials(e.to_string()))?,
        };

        Ok(Credentials {
            username,
            password: SecretString::new(password),
        })
    }
}

impl CredentialProvider for PromptCredentials {
    fn credentials(&self) -> SyncResult<Credentials> {
        let mut answered = self
            .answered
            .lock()
            .map_err(|_| SyncError::Credentials("credential prompt poisoned".into()))?;
        if let Some(credentials) = answered.as_ref() {
            return Ok(credentials.clone());
        }
        let credentials = self.ask()?;
        *answered = Some(credentials.clone());
        Ok(credentials)
    }
}
