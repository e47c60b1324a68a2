use crate::config::Credentials;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub credentials: Option<Credentials>,
}

impl Config {
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Config {
            credentials: Some(Credentials::new(username, password)),
        }
    }

    /// Blank usernames or passwords count as no credentials at all.
    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.trim().is_empty() && !c.password.trim().is_empty())
    }
}
