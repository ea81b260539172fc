// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux accessor.
//!
//! All command shapes are built by pure functions so they are testable
//! without a tmux server; [`TmuxAccessor`] only adds process spawning.

use crate::MuxError;

/// Accessor for one tmux server, addressed through an exec prefix.
///
/// An empty prefix drives the local tmux. A runtime constructs accessors
/// with the prefix that reaches inside its execution unit, e.g.
/// `["kubectl", "exec", "<pod>", "-n", "<ns>", "--"]`.
#[derive(Debug, Clone, Default)]
pub struct TmuxAccessor {
    exec_prefix: Vec<String>,
}

impl TmuxAccessor {
    /// Accessor for the local tmux server.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_exec_prefix(prefix: Vec<String>) -> Self {
        Self { exec_prefix: prefix }
    }

    pub fn exec_prefix(&self) -> &[String] {
        &self.exec_prefix
    }

    /// Send keys to a target session.
    ///
    /// `literal` selects tmux's `-l` mode: the text is typed verbatim
    /// instead of being interpreted for key names. Commands go non-literal
    /// (so a trailing `Enter` key is understood); prompts go literal (so a
    /// prompt that happens to contain `Enter` or `C-c` is not interpreted).
    pub async fn send_keys(&self, target: &str, text: &str, literal: bool) -> Result<(), MuxError> {
        self.run(&send_keys_args(target, text, literal)).await?;
        Ok(())
    }

    /// Kill a session. Fails if the session does not exist.
    pub async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        self.run(&kill_session_args(name)).await?;
        Ok(())
    }

    /// Create a session rooted at `cwd`. Detached unless `attach`.
    pub async fn new_session(
        &self,
        name: &str,
        cwd: Option<&str>,
        attach: bool,
    ) -> Result<(), MuxError> {
        self.run(&new_session_args(name, cwd, attach)).await?;
        Ok(())
    }

    /// Whether a session exists. A non-zero exit is `Ok(false)`; only a
    /// spawn failure (transport down) is an error.
    pub async fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        match self.run(&has_session_args(name)).await {
            Ok(_) => Ok(true),
            Err(MuxError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Capture the last `lines` lines of visible output from a target pane.
    pub async fn capture_pane(&self, target: &str, lines: u32) -> Result<String, MuxError> {
        self.run(&capture_pane_args(target, lines)).await
    }

    async fn run(&self, tmux_args: &[String]) -> Result<String, MuxError> {
        let (program, args) = command_line(&self.exec_prefix, tmux_args);
        let rendered = render_command(&program, &args);
        tracing::debug!(command = %rendered, "running tmux command");

        let output = tokio::process::Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|source| MuxError::Spawn { command: rendered.clone(), source })?;

        if !output.status.success() {
            return Err(MuxError::CommandFailed {
                command: rendered,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Compose the exec prefix with tmux arguments into (program, args).
pub fn command_line(prefix: &[String], tmux_args: &[String]) -> (String, Vec<String>) {
    match prefix.split_first() {
        Some((program, rest)) => {
            let mut args: Vec<String> = rest.to_vec();
            args.push("tmux".to_string());
            args.extend(tmux_args.iter().cloned());
            (program.clone(), args)
        }
        None => ("tmux".to_string(), tmux_args.to_vec()),
    }
}

pub fn send_keys_args(target: &str, text: &str, literal: bool) -> Vec<String> {
    let mut args = vec!["send-keys".to_string(), "-t".to_string(), target.to_string()];
    if literal {
        args.push("-l".to_string());
    }
    args.push(text.to_string());
    args
}

pub fn kill_session_args(name: &str) -> Vec<String> {
    vec!["kill-session".to_string(), "-t".to_string(), name.to_string()]
}

pub fn new_session_args(name: &str, cwd: Option<&str>, attach: bool) -> Vec<String> {
    let mut args = vec!["new-session".to_string()];
    if !attach {
        args.push("-d".to_string());
    }
    args.extend(["-s".to_string(), name.to_string()]);
    if let Some(cwd) = cwd {
        args.extend(["-c".to_string(), cwd.to_string()]);
    }
    args
}

pub fn has_session_args(name: &str) -> Vec<String> {
    vec!["has-session".to_string(), "-t".to_string(), name.to_string()]
}

pub fn capture_pane_args(target: &str, lines: u32) -> Vec<String> {
    vec![
        "capture-pane".to_string(),
        "-t".to_string(),
        target.to_string(),
        "-p".to_string(),
        "-S".to_string(),
        format!("-{lines}"),
    ]
}

fn render_command(program: &str, args: &[String]) -> String {
    let mut out = program.to_string();
    for arg in args {
        out.push(' ');
        out.push_str(arg);
    }
    out
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
