//! Author identity management.
//!
//! Identity resolution order:
//! 1) CLI --author (explicit, `Name <email>`)
//! 2) GITSAVE_AUTHOR environment variable
//! 3) Config `[author]` table
//! 4) Repository `user.name` / `user.email`
//! 5) `gitsave <gitsave@localhost>`

use git2::{Repository, Signature};

use crate::config::Config;
use crate::error::{Error, Result};

const FALLBACK_NAME: &str = "gitsave";
const FALLBACK_EMAIL: &str = "gitsave@localhost";

/// Who commits are attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parse `Name <email>`; a bare name gets the fallback email.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidArgument("author cannot be empty".to_string()));
        }

        match (raw.find('<'), raw.rfind('>')) {
            (Some(open), Some(close)) if open < close => {
                let name = raw[..open].trim();
                let email = raw[open + 1..close].trim();
                if name.is_empty() || email.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "author '{raw}' must look like 'Name <email>'"
                    )));
                }
                Ok(Self::new(name, email))
            }
            (None, None) => Ok(Self::new(raw, FALLBACK_EMAIL)),
            _ => Err(Error::InvalidArgument(format!(
                "author '{raw}' must look like 'Name <email>'"
            ))),
        }
    }

    /// Signature stamped with the current time.
    pub fn signature(&self) -> Result<Signature<'static>> {
        Ok(Signature::now(&self.name, &self.email)?)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Resolve the identity using CLI, environment, config, and repository settings.
pub fn resolve_identity(
    repo: &Repository,
    config: &Config,
    cli_author: Option<&str>,
) -> Result<Identity> {
    if let Some(author) = non_empty(cli_author) {
        return Identity::parse(author);
    }

    if let Ok(env_author) = std::env::var("GITSAVE_AUTHOR") {
        if let Some(author) = non_empty(Some(env_author.as_str())) {
            return Identity::parse(author);
        }
    }

    if let Some(name) = non_empty(config.author.name.as_deref()) {
        let email = non_empty(config.author.email.as_deref()).unwrap_or(FALLBACK_EMAIL);
        return Ok(Identity::new(name, email));
    }

    if let Ok(signature) = repo.signature() {
        if let (Some(name), Some(email)) = (signature.name(), signature.email()) {
            return Ok(Identity::new(name, email));
        }
    }

    Ok(Identity::new(FALLBACK_NAME, FALLBACK_EMAIL))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_and_email() {
        let identity = Identity::parse("Ada Lovelace <ada@example.com>").unwrap();
        assert_eq!(identity, Identity::new("Ada Lovelace", "ada@example.com"));
        assert_eq!(identity.to_string(), "Ada Lovelace <ada@example.com>");
    }

    #[test]
    fn parse_bare_name_uses_fallback_email() {
        let identity = Identity::parse("bot").unwrap();
        assert_eq!(identity.email, FALLBACK_EMAIL);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Identity::parse("").is_err());
        assert!(Identity::parse("<ada@example.com>").is_err());
        assert!(Identity::parse("Ada <ada@example.com").is_err());
    }

    #[test]
    fn cli_author_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        let identity =
            resolve_identity(&repo, &Config::default(), Some("Cli <cli@example.com>")).unwrap();
        assert_eq!(identity.name, "Cli");
    }
}
