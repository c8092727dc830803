use serialtap_session::{Session, SessionError};
use serialtap_transport::Transport;

/// The command being typed.
///
/// Cleared only after the session accepted and wrote it, so a rejected or
/// failed command stays available for another attempt.
#[derive(Debug, Default)]
pub struct CommandInput {
    pending: String,
}

impl CommandInput {
    pub fn set(&mut self, text: impl Into<String>) {
        self.pending = text.into();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn submit<T: Transport>(&mut self, session: &mut Session<T>) -> Result<(), SessionError> {
        session.send(&self.pending)?;
        self.pending.clear();
        Ok(())
    }
}
