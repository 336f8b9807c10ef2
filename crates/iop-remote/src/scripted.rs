//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Scripted in-process command runner for tests and dry runs."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::{CommandOutput, CommandRunner};
use crate::error::{RemoteError, Result};

/// Exit status returned for commands no rule answers, as a shell would for
/// an unknown command.
pub const UNSCRIPTED_EXIT: i32 = 127;

#[derive(Debug, Clone)]
enum Reply {
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Transport,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct Inner {
    rules: Vec<Rule>,
    history: Vec<String>,
}

/// A [`CommandRunner`] answering from substring rules and recording every
/// command it receives.
///
/// The most recently added matching rule wins, so tests can install broad
/// defaults and then override single commands. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` succeed with `stdout`.
    pub fn respond(&self, needle: &str, stdout: &str) -> &Self {
        self.push(
            needle,
            Reply::Output {
                exit_code: 0,
                stdout: stdout.to_owned(),
                stderr: String::new(),
            },
        )
    }

    /// Commands containing `needle` exit with `exit_code` and `stderr`.
    pub fn fail(&self, needle: &str, exit_code: i32, stderr: &str) -> &Self {
        self.push(
            needle,
            Reply::Output {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_owned(),
            },
        )
    }

    /// Commands containing `needle` exit with `exit_code` but still print `stdout`.
    pub fn respond_with_exit(&self, needle: &str, exit_code: i32, stdout: &str) -> &Self {
        self.push(
            needle,
            Reply::Output {
                exit_code,
                stdout: stdout.to_owned(),
                stderr: String::new(),
            },
        )
    }

    /// Commands containing `needle` fail as if the host were unreachable.
    pub fn transport_error(&self, needle: &str) -> &Self {
        self.push(needle, Reply::Transport)
    }

    /// Every command run so far, in order.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }

    /// Commands run so far that contain `needle`.
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|command| command.contains(needle))
            .cloned()
            .collect()
    }

    fn push(&self, needle: &str, reply: Reply) -> &Self {
        self.inner.lock().rules.push(Rule {
            needle: needle.to_owned(),
            reply,
        });
        self
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut inner = self.inner.lock();
        inner.history.push(command.to_owned());
        let reply = inner
            .rules
            .iter()
            .rev()
            .find(|rule| command.contains(&rule.needle))
            .map(|rule| rule.reply.clone());
        match reply {
            Some(Reply::Output {
                exit_code,
                stdout,
                stderr,
            }) => Ok(CommandOutput::new(command, exit_code, stdout, stderr)),
            Some(Reply::Transport) => Err(RemoteError::Transport {
                host: "scripted".to_owned(),
                stderr: "connection refused".to_owned(),
            }),
            None => Ok(CommandOutput::new(
                command,
                UNSCRIPTED_EXIT,
                "",
                format!("command not scripted: {}", command),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_rule_wins_and_history_is_recorded() {
        let runner = ScriptedRunner::new();
        runner.respond("podman", "default");
        runner.respond("podman volume ls", "iop-core-kafka-data\n");
        assert_eq!(
            runner.run("podman volume ls").unwrap().stdout,
            "iop-core-kafka-data\n"
        );
        assert_eq!(runner.run("podman ps").unwrap().stdout, "default");
        assert_eq!(runner.run("uptime").unwrap().exit_code, UNSCRIPTED_EXIT);
        assert_eq!(runner.history().len(), 3);
        assert_eq!(runner.commands_matching("podman").len(), 2);
    }

    #[test]
    fn transport_rule_errors() {
        let runner = ScriptedRunner::new();
        runner.transport_error("systemctl");
        let err = runner.run("systemctl is-active x").unwrap_err();
        assert!(err.is_transport());
    }
}
