//! `chatline chat`: one-shot or interactive chat in the terminal.
//!
//! The engine is loaded up front, so unlike `serve` a failed load is an
//! error here rather than a degraded reply.

use std::io::Write;
use std::sync::Arc;

use chatline_config::AppConfig;
use chatline_core::message::{ConversationContext, ConversationTurn, HISTORY_WINDOW};
use chatline_dialogue::ChatOrchestrator;
use chatline_engine::{EngineService, load_engine};
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    eprint!("  Loading {} ({})...", config.engine.model, config.engine.backend);
    let engine = load_engine(&config)
        .await
        .map_err(|e| format!("Engine failed to load: {e}"))?;
    eprint!("\r{}\r", " ".repeat(60));

    let service = Arc::new(EngineService::ready(config.engine.model.clone(), engine));
    let orchestrator = ChatOrchestrator::new(service, &config.generation);

    if let Some(msg) = message {
        let reply = orchestrator
            .respond(&ConversationContext::new(msg, Vec::new()))
            .await;
        println!("{}", reply.response);
        return Ok(());
    }

    println!();
    println!("  Chatline, interactive mode");
    println!("  Model:   {}", config.engine.model);
    println!("  Engine:  {}", config.engine.backend);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/reset' to forget the conversation, 'exit' or Ctrl+C to quit.");
    println!();

    let mut session = ChatSession::default();
    let mut lines = BufReader::new(io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                session.reset();
                println!("  (conversation cleared)");
            }
            _ => {
                eprint!("  ...");
                let reply = orchestrator.respond(&session.context_for(input)).await;
                eprint!("\r     \r");
                println!("  Assistant > {}", reply.response);
                session.record(input, &reply.response);
            }
        }
        println!();
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Terminal-side conversation history.
///
/// Keeps only the turns that can still reach the prompt.
#[derive(Debug, Default)]
struct ChatSession {
    turns: Vec<ConversationTurn>,
}

impl ChatSession {
    fn context_for(&self, message: &str) -> ConversationContext {
        ConversationContext::new(message, self.turns.clone())
    }

    fn record(&mut self, message: &str, reply: &str) {
        self.turns.push(ConversationTurn::user(message));
        self.turns.push(ConversationTurn::assistant(reply));
        if self.turns.len() > HISTORY_WINDOW {
            self.turns.drain(..self.turns.len() - HISTORY_WINDOW);
        }
    }

    fn reset(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::message::Role;

    #[test]
    fn fresh_session_has_no_history() {
        let session = ChatSession::default();
        let ctx = session.context_for("hi");
        assert_eq!(ctx.message(), "hi");
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn record_keeps_last_window_of_turns() {
        let mut session = ChatSession::default();
        session.record("one", "first reply");
        session.record("two", "second reply");
        session.record("three", "third reply");

        let ctx = session.context_for("four");
        let contents: Vec<&str> = ctx.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["two", "second reply", "three", "third reply"]);
        assert_eq!(ctx.history()[0].role, Role::User);
        assert_eq!(ctx.history()[1].role, Role::Assistant);
    }

    #[test]
    fn reset_clears_history() {
        let mut session = ChatSession::default();
        session.record("hello", "Hi there!");
        session.reset();
        assert!(session.context_for("again").history().is_empty());
    }
}
