//! Per-target reshaping of the tool-access (MCP) configuration.
//!
//! The canonical payload is `{"mcpServers": {name: server}}`. Targets either
//! keep that shape under another key or restructure each server.

use serde_json::{Map, Value, json};

/// Key holding the server map in the canonical payload.
pub const SERVERS_KEY: &str = "mcpServers";

/// The server map of a payload, if any.
pub fn servers(config: &Value) -> Option<&Map<String, Value>> {
    config.get(SERVERS_KEY).and_then(Value::as_object)
}

/// Sorted server names.
pub fn server_names(config: &Value) -> Vec<String> {
    servers(config)
        .map(|s| s.keys().cloned().collect())
        .unwrap_or_default()
}

/// Wrap the server map under `key` (`servers` for VS Code, `mcpServers` elsewhere).
///
/// Server entries are passed through unchanged. Returns `None` when the
/// payload defines no servers.
pub fn with_servers_key(config: &Value, key: &str) -> Option<Value> {
    let servers = servers(config)?;
    let mut out = Map::new();
    out.insert(key.to_string(), Value::Object(servers.clone()));
    Some(Value::Object(out))
}

/// OpenCode `mcp` section: command arrays, `type`, and `enabled` per server.
pub fn opencode_mcp(config: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(servers) = servers(config) else {
        return out;
    };

    for (name, server) in servers {
        let mut entry = Map::new();

        if let Some(url) = server.get("url").and_then(Value::as_str) {
            entry.insert("type".into(), json!("remote"));
            entry.insert("url".into(), json!(url));
            if let Some(headers) = server.get("headers") {
                entry.insert("headers".into(), headers.clone());
            }
        } else {
            let mut command: Vec<Value> = match server.get("command") {
                Some(Value::String(cmd)) => vec![json!(cmd)],
                Some(Value::Array(parts)) => parts.clone(),
                Some(other) => vec![json!(other.to_string())],
                None => Vec::new(),
            };
            if let Some(Value::Array(args)) = server.get("args") {
                command.extend(args.iter().cloned());
            }
            let kind = server
                .get("type")
                .and_then(Value::as_str)
                .filter(|t| *t != "stdio")
                .unwrap_or("local");
            entry.insert("type".into(), json!(kind));
            entry.insert("command".into(), Value::Array(command));
        }

        if let Some(env) = server.get("env") {
            entry.insert("env".into(), env.clone());
        }
        let enabled = server
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(!server.get("disabled").and_then(Value::as_bool).unwrap_or(false));
        entry.insert("enabled".into(), json!(enabled));

        out.insert(name.clone(), Value::Object(entry));
    }
    out
}
