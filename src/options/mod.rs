//! Topology option assignments and the precedence merge
//!
//! Options travel as `key=value` strings on the command line. Values are read
//! as YAML so that `true`, `4` or `[a, b]` arrive typed, the same way the
//! cluster's own `-c` flag interprets them.

use serde_json::Value;
use thiserror::Error;

use crate::domain::OptionMap;

pub mod resolve;
pub mod workers;

pub use resolve::{resolve_options, ResolveError, ResolveRequest};
pub use workers::{ConfiguredWorkers, WorkerSource};

pub const ACKER_EXECUTORS: &str = "topology.acker.executors";
pub const WORKERS: &str = "topology.workers";
pub const DEBUG: &str = "topology.debug";
pub const PYTHON_PATH: &str = "topology.python.path";
pub const SERIALIZER: &str = "topology.multilang.serializer";
pub const SUDO_USER: &str = "sudo_user";
pub const WORKERS_LIST: &str = "storm.workers.list";
pub const LOG_PATH: &str = "pystorm.log.path";
pub const LOG_FILE: &str = "pystorm.log.file";
pub const LOG_MAX_BYTES: &str = "pystorm.log.max_bytes";
pub const LOG_BACKUP_COUNT: &str = "pystorm.log.backup_count";
pub const LOG_LEVEL: &str = "pystorm.log.level";
pub const NIMBUS_SEEDS: &str = "nimbus.seeds";
pub const THRIFT_TIMEOUT_MS: &str = "storm.thrift.socket.timeout.ms";

#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    #[error("option '{0}' must look like KEY=VALUE")]
    MissingEquals(String),
    #[error("option '{0}' has an empty key")]
    EmptyKey(String),
    #[error("option '{key}' has an unparseable value: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Split `key=value` on the first `=` and parse the value as YAML.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), OptionError> {
    let (key, value) =
        raw.split_once('=').ok_or_else(|| OptionError::MissingEquals(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(OptionError::EmptyKey(raw.to_string()));
    }
    Ok((key.to_string(), parse_value(key, value)?))
}

fn parse_value(key: &str, value: &str) -> Result<Value, OptionError> {
    if value.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str::<Value>(value)
        .map_err(|e| OptionError::InvalidValue { key: key.to_string(), reason: e.to_string() })
}

/// Build the `key=value` string a dedicated flag stands for.
pub fn option_alias(key: &str, value: &str) -> String {
    format!("{key}={value}")
}

/// Fold assignments into an option map; later assignments win.
pub fn collect_assignments<I, S>(assignments: I) -> Result<OptionMap, OptionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = OptionMap::new();
    for raw in assignments {
        let (key, value) = parse_assignment(raw.as_ref())?;
        options.insert(key, value);
    }
    Ok(options)
}

/// YAML-style truthiness used for flags such as `topology.debug`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_parsed_as_yaml() {
        assert_eq!(parse_assignment("topology.workers=4").unwrap().1, json!(4));
        assert_eq!(parse_assignment("topology.debug=true").unwrap().1, json!(true));
        assert_eq!(parse_assignment("ratio=0.5").unwrap().1, json!(0.5));
        assert_eq!(parse_assignment("hosts=[a, b]").unwrap().1, json!(["a", "b"]));
        assert_eq!(parse_assignment("name=word").unwrap().1, json!("word"));
        assert_eq!(parse_assignment("quoted='4'").unwrap().1, json!("4"));
    }

    #[test]
    fn splits_on_first_equals_only() {
        let (key, value) = parse_assignment("topology.env=A=B").unwrap();
        assert_eq!(key, "topology.env");
        assert_eq!(value, json!("A=B"));
    }

    #[test]
    fn empty_value_is_null() {
        assert_eq!(parse_assignment("sudo_user=").unwrap().1, Value::Null);
    }

    #[test]
    fn rejects_malformed_assignments() {
        assert_eq!(
            parse_assignment("topology.debug"),
            Err(OptionError::MissingEquals("topology.debug".into()))
        );
        assert_eq!(parse_assignment("=3"), Err(OptionError::EmptyKey("=3".into())));
        assert!(matches!(
            parse_assignment("bad=[unterminated"),
            Err(OptionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn later_assignments_win() {
        let options =
            collect_assignments(["topology.workers=2", "a=1", "topology.workers=8"]).unwrap();
        assert_eq!(options.get("topology.workers"), Some(&json!(8)));
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn alias_builds_assignment() {
        assert_eq!(option_alias(ACKER_EXECUTORS, "3"), "topology.acker.executors=3");
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!(1)));
    }
}
