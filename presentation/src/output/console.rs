//! Console output formatting for chat, status and configuration issues

use crate::console::AgentStatus;
use blockhand_domain::ConfigIssue;
use colored::Colorize;

/// Formats console output
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format a chat line. Lines from `player` stand out from agent lines.
    pub fn chat_line(sender: &str, message: &str, player: &str) -> String {
        let name = format!("<{}>", sender);
        let name = if sender.eq_ignore_ascii_case(player) {
            name.green().bold()
        } else {
            name.cyan().bold()
        };
        format!("{} {}", name, message)
    }

    /// Format the agent status table
    pub fn status(agents: &[AgentStatus]) -> String {
        if agents.is_empty() {
            return "No agents in the world".dimmed().to_string();
        }

        let mut output = Self::section_header("Agents");
        for agent in agents {
            let connection = if agent.connected {
                "online".green()
            } else {
                "offline".red()
            };
            let behavior = match &agent.state.follow_target {
                Some(target) => format!("{} {}", agent.state.current_behavior, target),
                None => agent.state.current_behavior.to_string(),
            };
            output.push_str(&format!(
                "  {:<12} {:<9} {:<8} {:<18} holding {:>3}  at {}\n",
                agent.name.bold(),
                agent.role.as_str(),
                connection,
                behavior,
                agent.held,
                agent.state.position
            ));
        }
        output
    }

    /// Format configuration issues, errors first
    pub fn issues(issues: &[ConfigIssue]) -> String {
        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|issue| !issue.is_error());
        sorted
            .into_iter()
            .map(|issue| {
                if issue.is_error() {
                    format!("{} {}", "error:".red().bold(), issue.message)
                } else {
                    format!("{} {}", "warning:".yellow().bold(), issue.message)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn welcome(player: &str, agents: &[String]) -> String {
        let line = "=".repeat(60);
        let mut output = format!(
            "{}\n{:^60}\n{}\n\n",
            line.cyan(),
            "blockhand".bold(),
            line.cyan()
        );
        output.push_str(&format!("{} {}\n", "Speaking as:".cyan().bold(), player));
        output.push_str(&format!(
            "{} {}\n\n",
            "Agents:".cyan().bold(),
            agents.join(", ")
        ));
        output.push_str("Type /help for console commands.");
        output
    }

    pub fn help() -> String {
        let mut output = Self::section_header("Console commands");
        for (usage, description) in [
            ("<text>", "Say <text> in chat as the player"),
            ("/as <name> <text>", "Say <text> as someone else"),
            ("/status, /s", "Show every agent"),
            ("/kick <agent>", "Drop an agent's connection"),
            ("/help, /h, /?", "Show this help"),
            ("/quit, /exit, /q", "Exit"),
        ] {
            output.push_str(&format!("  {:<20} {}\n", usage, description));
        }
        output
    }

    pub fn notice(message: &str) -> String {
        message.dimmed().to_string()
    }

    pub fn error(message: &str) -> String {
        format!("{} {}", "Error:".red().bold(), message)
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}
