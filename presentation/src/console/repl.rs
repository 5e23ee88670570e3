//! Read loop forwarding console lines into the world

use super::input::ConsoleInput;
use crate::output::console::ConsoleFormatter;
use blockhand_application::WorldError;
use blockhand_domain::{AgentState, Role};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// What `/status` shows for one agent.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub name: String,
    pub role: Role,
    pub connected: bool,
    /// Last state the agent's executor observed.
    pub state: AgentState,
    /// Units of the agent's resource held right now.
    pub held: u32,
}

/// The running world as seen from the console.
pub trait ConsoleBackend: Send + Sync {
    /// Speak in chat as `speaker`. Fails for a disconnected agent.
    fn say(&self, speaker: &str, message: &str) -> Result<(), WorldError>;

    /// Drop an agent's connection.
    fn kick(&self, agent: &str) -> Result<(), WorldError>;

    fn agents(&self) -> Vec<AgentStatus>;
}

/// Result of handling one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Silent,
    Text(String),
    Quit,
}

/// Interactive console bridge
pub struct ConsoleRepl<B: ConsoleBackend> {
    backend: Arc<B>,
    player: String,
}

impl<B: ConsoleBackend> ConsoleRepl<B> {
    pub fn new(backend: Arc<B>, player: impl Into<String>) -> Self {
        Self {
            backend,
            player: player.into(),
        }
    }

    /// Read stdin until `/quit`, end of input, or `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let names: Vec<String> = self.backend.agents().into_iter().map(|a| a.name).collect();
        println!("{}", ConsoleFormatter::welcome(&self.player, &names));

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                println!("Bye!");
                break;
            };

            match self.handle(&line) {
                Reply::Silent => {}
                Reply::Text(text) => println!("{}", text),
                Reply::Quit => {
                    println!("Bye!");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one console line.
    pub fn handle(&self, line: &str) -> Reply {
        match ConsoleInput::parse(line) {
            ConsoleInput::Empty => Reply::Silent,
            ConsoleInput::Quit => Reply::Quit,
            ConsoleInput::Help => Reply::Text(ConsoleFormatter::help()),
            ConsoleInput::Status => Reply::Text(ConsoleFormatter::status(&self.backend.agents())),
            ConsoleInput::Invalid(reason) => Reply::Text(ConsoleFormatter::error(&reason)),
            ConsoleInput::Chat(message) => self.forward(&self.player, &message),
            ConsoleInput::As { speaker, message } => self.forward(&speaker, &message),
            ConsoleInput::Kick(agent) => match self.backend.kick(&agent) {
                Ok(()) => Reply::Text(ConsoleFormatter::notice(&format!("Kicked {}", agent))),
                Err(e) => Reply::Text(ConsoleFormatter::error(&format!(
                    "Cannot kick {}: {}",
                    agent, e
                ))),
            },
        }
    }

    // Successful lines come back through the chat feed, so only failures
    // are reported here.
    fn forward(&self, speaker: &str, message: &str) -> Reply {
        match self.backend.say(speaker, message) {
            Ok(()) => Reply::Silent,
            Err(e) => Reply::Text(ConsoleFormatter::error(&format!(
                "{} cannot chat: {}",
                speaker, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBackend {
        said: Mutex<Vec<(String, String)>>,
        kicked: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn connected(&self, name: &str) -> bool {
            !self.kicked.lock().unwrap().iter().any(|k| k == name)
        }
    }

    impl ConsoleBackend for MockBackend {
        fn say(&self, speaker: &str, message: &str) -> Result<(), WorldError> {
            if !self.connected(speaker) {
                return Err(WorldError::NotConnected);
            }
            self.said
                .lock()
                .unwrap()
                .push((speaker.to_string(), message.to_string()));
            Ok(())
        }

        fn kick(&self, agent: &str) -> Result<(), WorldError> {
            if !self.connected(agent) {
                return Err(WorldError::NotConnected);
            }
            self.kicked.lock().unwrap().push(agent.to_string());
            Ok(())
        }

        fn agents(&self) -> Vec<AgentStatus> {
            vec![AgentStatus {
                name: "Builder".to_string(),
                role: Role::Builder,
                connected: self.connected("Builder"),
                state: AgentState::default(),
                held: 3,
            }]
        }
    }

    fn repl() -> (Arc<MockBackend>, ConsoleRepl<MockBackend>) {
        let backend = Arc::new(MockBackend::default());
        let repl = ConsoleRepl::new(backend.clone(), "Steve");
        (backend, repl)
    }

    #[test]
    fn test_plain_line_is_spoken_by_player() {
        let (backend, repl) = repl();
        assert_eq!(repl.handle("@Builder !come"), Reply::Silent);
        assert_eq!(
            backend.said.lock().unwrap().as_slice(),
            &[("Steve".to_string(), "@Builder !come".to_string())]
        );
    }

    #[test]
    fn test_kicked_agent_rejects_forwarded_chat() {
        let (backend, repl) = repl();
        assert!(matches!(repl.handle("/kick Builder"), Reply::Text(_)));

        let Reply::Text(text) = repl.handle("/as Builder hello") else {
            panic!("expected an error reply");
        };
        assert!(text.contains("Builder cannot chat"));
        assert!(backend.said.lock().unwrap().is_empty());
    }

    #[test]
    fn test_status_lists_agents() {
        let (_backend, repl) = repl();
        let Reply::Text(text) = repl.handle("/status") else {
            panic!("expected a status table");
        };
        assert!(text.contains("Builder"));
        assert!(text.contains("idle"));
    }

    #[test]
    fn test_quit() {
        let (_backend, repl) = repl();
        assert_eq!(repl.handle("/quit"), Reply::Quit);
        assert_eq!(repl.handle(""), Reply::Silent);
    }
}
