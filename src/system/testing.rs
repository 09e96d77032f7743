//! Scripted command runner for exercising hardware paths without hardware.

use crate::error::{Result, WipeError};
use crate::system::runner::{CommandOutput, CommandRunner, command_line};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
enum Reply {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug)]
struct Rule {
    prefix: String,
    replies: VecDeque<Reply>,
}

/// A [`CommandRunner`] that replays canned outputs.
///
/// Rules match on the start of the full command line. When a rule holds
/// several replies they are consumed in order and the last one repeats.
/// Unmatched commands succeed with empty output. Sleeping is a no-op.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    missing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// Creates a runner where every tool exists and every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reply for commands starting with `prefix`.
    #[must_use]
    pub fn on(self, prefix: &str, output: CommandOutput) -> Self {
        self.push(prefix, Reply::Output(output));
        self
    }

    /// Adds a successful reply with `stdout`.
    #[must_use]
    pub fn on_ok(self, prefix: &str, stdout: &str) -> Self {
        self.on(prefix, CommandOutput::ok(stdout))
    }

    /// Makes commands starting with `prefix` time out.
    #[must_use]
    pub fn on_timeout(self, prefix: &str) -> Self {
        self.push(prefix, Reply::Timeout);
        self
    }

    /// Marks a tool as not installed.
    #[must_use]
    pub fn without_tool(self, tool: &str) -> Self {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(tool.to_string());
        }
        self
    }

    /// Command lines run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Whether any recorded command line starts with `prefix`.
    #[must_use]
    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn push(&self, prefix: &str, reply: Reply) {
        if let Ok(mut rules) = self.rules.lock() {
            if let Some(rule) = rules.iter_mut().find(|r| r.prefix == prefix) {
                rule.replies.push_back(reply);
            } else {
                rules.push(Rule {
                    prefix: prefix.to_string(),
                    replies: VecDeque::from([reply]),
                });
            }
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let line = command_line(program, args);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let mut rules = match self.rules.lock() {
            Ok(rules) => rules,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Longest matching prefix wins.
        let rule = rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());

        let Some(rule) = rule else {
            return Ok(CommandOutput::default());
        };
        let reply = if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            None
        };
        match reply.as_ref().or_else(|| rule.replies.front()) {
            Some(Reply::Output(out)) => Ok(out.clone()),
            Some(Reply::Timeout) => Err(WipeError::Timeout {
                step: line,
                secs: timeout.as_secs(),
            }
            .into()),
            None => Ok(CommandOutput::default()),
        }
    }

    fn exists(&self, program: &str) -> bool {
        self.missing
            .lock()
            .map(|m| !m.contains(program))
            .unwrap_or(true)
    }

    fn sleep(&self, _duration: Duration) {}
}
