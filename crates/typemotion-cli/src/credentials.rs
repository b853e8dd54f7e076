//! Credential gate backed by the environment and an interactive prompt

use async_trait::async_trait;
use console::Term;
use typemotion::{CredentialGate, SharedApiKey};

/// Gate that checks a [`SharedApiKey`] and prompts on stderr when asked.
///
/// When stderr is not a terminal the request only logs a warning and the key
/// stays unset.
#[derive(Debug, Clone)]
pub struct PromptCredentialGate {
    key: SharedApiKey,
    interactive: bool,
}

impl PromptCredentialGate {
    /// Gate over `key`, prompting only if stderr is a terminal
    #[must_use]
    pub fn new(key: SharedApiKey) -> Self {
        let interactive = Term::stderr().is_term();
        Self { key, interactive }
    }

    /// Gate that never prompts
    #[must_use]
    pub fn non_interactive(key: SharedApiKey) -> Self {
        Self {
            key,
            interactive: false,
        }
    }

    /// The shared key
    #[must_use]
    pub fn key(&self) -> &SharedApiKey {
        &self.key
    }
}

#[async_trait]
impl CredentialGate for PromptCredentialGate {
    async fn has_credential(&self) -> bool {
        self.key.is_set()
    }

    async fn request_credential(&self) {
        if !self.interactive {
            tracing::warn!("API key required; set GEMINI_API_KEY");
            return;
        }

        let entered = tokio::task::spawn_blocking(|| {
            let term = Term::stderr();
            term.write_str("Gemini API key: ")?;
            term.read_secure_line()
        })
        .await;

        match entered {
            Ok(Ok(key)) if !key.trim().is_empty() => {
                self.key.set(key);
                tracing::info!("API key entered");
            }
            Ok(Ok(_)) => tracing::warn!("no API key entered"),
            Ok(Err(e)) => tracing::warn!(error = %e, "could not read API key"),
            Err(e) => tracing::warn!(error = %e, "API key prompt aborted"),
        }
    }
}

/// Gate that always reports a credential, for the offline mock service
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGate;

#[async_trait]
impl CredentialGate for OfflineGate {
    async fn has_credential(&self) -> bool {
        true
    }

    async fn request_credential(&self) {}
}
