//! Typed chat command grammar.
//!
//! ```text
//! <address> !harvest <positive-int>
//! <address> !platform <positive-int>
//! <address> !come | !follow | !stopfollow | !throw
//! ```
//!
//! The address is either an `@name` token or the agent's own name as a
//! literal prefix, compared case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A command the agent knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Gather `n` units of the configured resource.
    Harvest(u32),
    /// Build an `n`×`n` platform next to the requester.
    Platform(u32),
    /// Walk to the requester once.
    Come,
    /// Keep pursuing the requester until told to stop.
    Follow,
    /// Stop pursuing.
    StopFollow,
    /// Hand every carried unit of the resource to the requester.
    Throw,
}

/// Why a recognized verb could not be turned into a [`Command`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: !{verb} <positive number>")]
    MissingArgument { verb: &'static str },

    #[error("'{value}' is not a positive number. Usage: !{verb} <positive number>")]
    InvalidArgument { verb: &'static str, value: String },
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Harvest(_) => "harvest",
            Command::Platform(_) => "platform",
            Command::Come => "come",
            Command::Follow => "follow",
            Command::StopFollow => "stopfollow",
            Command::Throw => "throw",
        }
    }

    /// Render the command in its chat form, e.g. `!harvest 11`.
    pub fn encode(&self) -> String {
        match self {
            Command::Harvest(n) | Command::Platform(n) => format!("!{} {}", self.verb(), n),
            _ => format!("!{}", self.verb()),
        }
    }

    /// Parse the first `!verb` token in `body`.
    ///
    /// Returns `Ok(None)` when there is no command token or the verb is
    /// unknown; those messages are ignored rather than answered.
    pub fn parse(body: &str) -> Result<Option<Command>, CommandError> {
        let mut tokens = body
            .split_whitespace()
            .skip_while(|token| !token.starts_with('!'));

        let Some(head) = tokens.next() else {
            return Ok(None);
        };
        let verb = head.trim_start_matches('!').to_lowercase();

        let command = match verb.as_str() {
            "harvest" => Command::Harvest(positive_arg("harvest", tokens.next())?),
            "platform" => Command::Platform(positive_arg("platform", tokens.next())?),
            "come" => Command::Come,
            "follow" => Command::Follow,
            "stopfollow" => Command::StopFollow,
            "throw" => Command::Throw,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn positive_arg(verb: &'static str, token: Option<&str>) -> Result<u32, CommandError> {
    let raw = token.ok_or(CommandError::MissingArgument { verb })?;
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::InvalidArgument {
            verb,
            value: raw.to_string(),
        }),
    }
}

/// A parsed command together with whoever asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    pub command: Command,
    pub requester: String,
}

impl ChatCommand {
    pub fn new(command: Command, requester: impl Into<String>) -> Self {
        Self {
            command,
            requester: requester.into(),
        }
    }
}

/// Strip the address from a chat line aimed at `own_name`.
///
/// Returns `None` when the message is not addressed to this agent.
pub fn strip_address(text: &str, own_name: &str) -> Option<String> {
    let text = text.trim();
    if own_name.is_empty() {
        return None;
    }
    let mention = format!("@{}", own_name.to_lowercase());

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if let Some(index) = tokens.iter().position(|token| {
        token
            .trim_end_matches([',', ':'])
            .eq_ignore_ascii_case(&mention)
    }) {
        let rest: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, t)| *t)
            .collect();
        return Some(rest.join(" "));
    }

    let prefix_len = own_name.len();
    let head = text.get(..prefix_len)?;
    if !head.eq_ignore_ascii_case(own_name) {
        return None;
    }
    let rest = &text[prefix_len..];
    match rest.chars().next() {
        None => Some(String::new()),
        Some(c) if c.is_whitespace() || c == ',' || c == ':' => {
            Some(rest.trim_start_matches([',', ':']).trim().to_string())
        }
        Some(_) => None,
    }
}
