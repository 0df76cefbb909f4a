//! Environment selection

use super::ConfigError;
use crate::domain::{EnvConfig, ProjectConfig, DEFAULT_SERIALIZER};

/// Pick the environment named on the command line, or the only one defined.
pub fn select_environment<'a>(
    config: &'a ProjectConfig,
    name: Option<&str>,
) -> Result<(&'a str, &'a EnvConfig), ConfigError> {
    match name {
        Some(name) => config
            .envs
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                available: env_names(config),
            }),
        None => {
            let mut envs = config.envs.iter();
            match (envs.next(), envs.next()) {
                (Some((name, env)), None) => {
                    tracing::debug!(env = %name, "using the only configured environment");
                    Ok((name.as_str(), env))
                }
                (None, _) => Err(ConfigError::NoEnvironments),
                _ => Err(ConfigError::AmbiguousEnvironment(env_names(config))),
            }
        }
    }
}

/// Serializer for the multi-language protocol: environment, then project,
/// then the JSON default.
pub fn resolve_serializer<'a>(config: &'a ProjectConfig, env: &'a EnvConfig) -> &'a str {
    env.serializer
        .as_deref()
        .or(config.serializer.as_deref())
        .unwrap_or(DEFAULT_SERIALIZER)
}

fn env_names(config: &ProjectConfig) -> String {
    config.envs.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(names: &[&str]) -> ProjectConfig {
        let mut cfg = ProjectConfig::default();
        for name in names {
            cfg.envs.insert(name.to_string(), EnvConfig::default());
        }
        cfg
    }

    #[test]
    fn single_environment_is_implicit() {
        let cfg = config_with(&["prod"]);
        let (name, _) = select_environment(&cfg, None).unwrap();
        assert_eq!(name, "prod");
    }

    #[test]
    fn several_environments_need_a_name() {
        let cfg = config_with(&["prod", "staging"]);
        let err = select_environment(&cfg, None).unwrap_err();
        assert_eq!(err.to_string(), "several environments defined (prod, staging); pick one with --environment");
        let (name, _) = select_environment(&cfg, Some("staging")).unwrap();
        assert_eq!(name, "staging");
    }

    #[test]
    fn unknown_environment_lists_available() {
        let cfg = config_with(&["prod"]);
        let err = select_environment(&cfg, Some("dev")).unwrap_err();
        assert!(err.to_string().contains("available: prod"));
    }

    #[test]
    fn no_environments() {
        let cfg = config_with(&[]);
        assert!(matches!(select_environment(&cfg, None), Err(ConfigError::NoEnvironments)));
    }

    #[test]
    fn serializer_precedence() {
        let mut cfg = config_with(&["prod"]);
        let mut env = EnvConfig::default();
        assert_eq!(resolve_serializer(&cfg, &env), "json");
        cfg.serializer = Some("msgpack".into());
        assert_eq!(resolve_serializer(&cfg, &env), "msgpack");
        env.serializer = Some("json".into());
        assert_eq!(resolve_serializer(&cfg, &env), "json");
    }
}
