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

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.is_empty() && !c.password.is_empty())
    }
}
