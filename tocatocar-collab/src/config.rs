use std::env;

use crate::DispatchMode;

/// Settings for the collab system, usually read from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollabConfig {
    /// Emails that are treated as admins regardless of role
    pub admin_emails: Vec<String>,
    pub dispatch: DispatchMode,
    /// Hosted pub/sub relay to forward events to, if any
    pub relay: Option<RelayConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub url: String,
    pub key: Option<String>,
}

impl CollabConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the config from a variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_emails = var("TOCATOCAR_ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let dispatch = match var("TOCATOCAR_DISPATCH") {
            Some(mode) => mode.parse()?,
            None => DispatchMode::default(),
        };

        let relay = var("TOCATOCAR_RELAY_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| RelayConfig {
                url,
                key: var("TOCATOCAR_RELAY_KEY"),
            });

        Ok(Self {
            admin_emails,
            dispatch,
            relay,
        })
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<CollabConfig, String> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        CollabConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), Ok(CollabConfig::default()));
    }

    #[test]
    fn test_reads_variables() {
        let config = config(&[
            ("TOCATOCAR_ADMIN_EMAILS", "Ana@Example.com, ,bob@example.com"),
            ("TOCATOCAR_DISPATCH", "deferred"),
            ("TOCATOCAR_RELAY_URL", "https://relay.example.com/publish"),
            ("TOCATOCAR_RELAY_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.admin_emails, ["ana@example.com", "bob@example.com"]);
        assert_eq!(config.dispatch, DispatchMode::Deferred);
        assert_eq!(
            config.relay,
            Some(RelayConfig {
                url: "https://relay.example.com/publish".to_string(),
                key: Some("secret".to_string()),
            })
        );
    }

    #[test]
    fn test_rejects_unknown_dispatch_mode() {
        assert!(config(&[("TOCATOCAR_DISPATCH", "sometimes")]).is_err());
    }
}
