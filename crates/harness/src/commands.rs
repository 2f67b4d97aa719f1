//! Command table of the mock harness.
//!
//! Maps command names to handlers. A handler returns `Ok(payload)` for a
//! success envelope or `Err(payload)` for an error envelope. Silent commands
//! are accepted but never answered.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};

use remote_ui_protocol::{CommandFrame, ResponseEnvelope};

pub type CommandHandler = Arc<dyn Fn(Option<Value>) -> Result<Value, Value> + Send + Sync>;

#[derive(Clone)]
enum CommandEntry {
    Reply(CommandHandler),
    Silent,
}

#[derive(Clone, Default)]
pub struct CommandTable {
    entries: Arc<DashMap<String, CommandEntry>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the stock commands a freshly started desktop backend answers.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        table.register("get_max_consumption_levels", |_| {
            Ok(json!({ "max_cpu_available": 100, "max_gpu_available": 50 }))
        });
        table.register("get_network", |_| Ok(json!("localnet")));
        table.register("start_mining", |_| Ok(Value::Null));
        table.register("stop_mining", |_| Ok(Value::Null));
        table
    }

    pub fn register<F>(&self, command: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.entries
            .insert(command.to_string(), CommandEntry::Reply(Arc::new(handler)));
    }

    /// Register a command that is swallowed without a response.
    pub fn register_silent(&self, command: &str) {
        self.entries.insert(command.to_string(), CommandEntry::Silent);
    }

    pub fn contains(&self, command: &str) -> bool {
        self.entries.contains_key(command)
    }

    /// Envelope to send back for `frame`, or `None` for silent commands.
    pub fn respond(&self, frame: &CommandFrame) -> Option<ResponseEnvelope> {
        let entry = self.entries.get(&frame.cmd).map(|e| e.value().clone());
        match entry {
            Some(CommandEntry::Reply(handler)) => Some(match handler(frame.args.clone()) {
                Ok(payload) => ResponseEnvelope::success(payload),
                Err(payload) => ResponseEnvelope::error(payload),
            }),
            Some(CommandEntry::Silent) => {
                tracing::debug!(command = %frame.cmd, request_id = frame.id, "Silent command, not answering");
                None
            }
            None => {
                tracing::warn!(command = %frame.cmd, request_id = frame.id, "Unknown command");
                Some(ResponseEnvelope::error(Value::String(format!(
                    "unknown command: {}",
                    frame.cmd
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cmd: &str, args: Option<Value>) -> CommandFrame {
        CommandFrame {
            id: 1,
            cmd: cmd.to_string(),
            args,
            options: None,
        }
    }

    #[test]
    fn test_default_consumption_levels() {
        let table = CommandTable::with_defaults();
        let envelope = table
            .respond(&frame("get_max_consumption_levels", None))
            .unwrap();
        assert!(envelope.is_success());
        assert_eq!(
            envelope.payload,
            json!({ "max_cpu_available": 100, "max_gpu_available": 50 })
        );
    }

    #[test]
    fn test_handler_receives_args_and_may_fail() {
        let table = CommandTable::new();
        table.register("set_mode", |args| {
            let mode = args
                .as_ref()
                .and_then(|a| a.get("mode"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if mode == "Ludicrous" {
                Ok(json!(mode))
            } else {
                Err(json!({ "invalid_mode": mode }))
            }
        });

        let ok = table
            .respond(&frame("set_mode", Some(json!({ "mode": "Ludicrous" }))))
            .unwrap();
        assert!(ok.is_success());

        let err = table
            .respond(&frame("set_mode", Some(json!({ "mode": "Turbo" }))))
            .unwrap();
        assert!(!err.is_success());
        assert_eq!(err.payload, json!({ "invalid_mode": "Turbo" }));
    }

    #[test]
    fn test_unknown_command_is_an_error_envelope() {
        let envelope = CommandTable::new()
            .respond(&frame("does_not_exist", None))
            .unwrap();
        assert!(!envelope.is_success());
        assert_eq!(envelope.payload, json!("unknown command: does_not_exist"));
    }

    #[test]
    fn test_silent_command_gets_no_response() {
        let table = CommandTable::new();
        table.register_silent("slow_command");
        assert!(table.contains("slow_command"));
        assert!(table.respond(&frame("slow_command", None)).is_none());
    }
}
