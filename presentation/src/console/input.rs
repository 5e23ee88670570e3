//! Console line grammar

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Say the line as the player.
    Chat(String),
    /// Say `message` as another body, usually an agent.
    As { speaker: String, message: String },
    Status,
    /// Drop an agent's connection.
    Kick(String),
    Help,
    Quit,
    Empty,
    /// A slash command that could not be understood.
    Invalid(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleInput::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ConsoleInput::Chat(line.to_string());
        };

        let (verb, rest) = command
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((command, ""));
        match verb {
            "quit" | "exit" | "q" => ConsoleInput::Quit,
            "help" | "h" | "?" => ConsoleInput::Help,
            "status" | "s" => ConsoleInput::Status,
            "kick" if !rest.is_empty() => ConsoleInput::Kick(rest.to_string()),
            "as" => match rest.split_once(char::is_whitespace) {
                Some((speaker, message)) if !message.trim().is_empty() => ConsoleInput::As {
                    speaker: speaker.to_string(),
                    message: message.trim().to_string(),
                },
                _ => ConsoleInput::Invalid("usage: /as <name> <message>".to_string()),
            },
            "kick" => ConsoleInput::Invalid("usage: /kick <agent>".to_string()),
            _ => ConsoleInput::Invalid(format!("Unknown command: /{}", verb)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_chat() {
        assert_eq!(
            ConsoleInput::parse("  @Builder !platform 3 "),
            ConsoleInput::Chat("@Builder !platform 3".to_string())
        );
        assert_eq!(ConsoleInput::parse("   "), ConsoleInput::Empty);
    }

    #[test]
    fn test_as_keeps_the_whole_message() {
        assert_eq!(
            ConsoleInput::parse("/as Merchant hello   there"),
            ConsoleInput::As {
                speaker: "Merchant".to_string(),
                message: "hello   there".to_string(),
            }
        );
        assert!(matches!(
            ConsoleInput::parse("/as Merchant"),
            ConsoleInput::Invalid(_)
        ));
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(ConsoleInput::parse("/q"), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse("/status"), ConsoleInput::Status);
        assert_eq!(
            ConsoleInput::parse("/kick Merchant"),
            ConsoleInput::Kick("Merchant".to_string())
        );
        assert!(matches!(ConsoleInput::parse("/kick"), ConsoleInput::Invalid(_)));
        assert_eq!(
            ConsoleInput::parse("/dance"),
            ConsoleInput::Invalid("Unknown command: /dance".to_string())
        );
    }
}
