//! CLI argument parsing and the one-shot subcommands.

use clap::{Parser, Subcommand};

use relay_agent::remix;

use crate::state::AppState;

/// Relay between the dashboard and the remote agent service.
#[derive(Debug, Parser)]
#[command(name = "agent-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Send one message, wait for the reply and print it as JSON
    Ask {
        /// Target agent (defaults to AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
        message: String,
    },
    /// List agents whose name matches a prefix
    Agents {
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

pub async fn ask(state: &AppState, agent: Option<&str>, message: &str) -> anyhow::Result<()> {
    let agent = state.resolve_agent(agent)?;
    let poller = state.poller()?;
    let reply = poller.submit_and_await(&agent, message, &state.poll).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

pub async fn agents(state: &AppState, prefix: &str) -> anyhow::Result<()> {
    let listing = remix::list_agents(state.transport()?, prefix).await?;
    for agent in &listing.agents {
        println!("{}", agent.name);
    }
    println!("({} of {} agents)", listing.agents.len(), listing.total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["agent-relay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn ask_takes_agent_and_message() {
        let cli = Cli::try_parse_from(["agent-relay", "ask", "--agent", "lway", "hello there"]).unwrap();
        match cli.command {
            Some(Command::Ask { agent, message }) => {
                assert_eq!(agent.as_deref(), Some("lway"));
                assert_eq!(message, "hello there");
            }
            other => panic!("expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn agents_prefix_defaults_to_empty() {
        let cli = Cli::try_parse_from(["agent-relay", "agents"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Agents { ref prefix }) if prefix.is_empty()));
    }
}
