use anyhow::Result;
use ayurbot::commands::{run_chat, run_quiz, show_status};
use ayurbot::config::{resolve_config_dir, run_interactive_config, show_config};
use ayurbot::dosha::QuizKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ayurbot")]
#[command(about = "Dosha quiz and Ayurvedic remedy chat backed by a local Ollama model")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the passage index
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Take the dosha quiz and print the result
    Quiz {
        /// Question set to use instead of the configured one
        #[arg(long, value_enum)]
        quiz: Option<QuizKind>,
    },
    /// Take the quiz, then ask for remedies
    Chat {
        /// Question set to use instead of the configured one
        #[arg(long, value_enum)]
        quiz: Option<QuizKind>,
    },
    /// Show Ollama health and passage index size
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Quiz { quiz } => {
            let kind = match quiz {
                Some(kind) => kind,
                None => ayurbot::config::Config::load(&config_dir)?.session.quiz,
            };
            run_quiz(kind)?;
        }
        Commands::Chat { quiz } => {
            run_chat(&config_dir, quiz).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let parsed = Cli::try_parse_from(["ayurbot", "status"]).expect("should parse");
        assert!(matches!(parsed.command, Commands::Status));
        assert_eq!(parsed.config_dir, None);
    }

    #[test]
    fn chat_defaults_to_configured_quiz() {
        let parsed = Cli::try_parse_from(["ayurbot", "chat"]).expect("should parse");
        assert!(matches!(parsed.command, Commands::Chat { quiz: None }));
    }

    #[test]
    fn quiz_kind_flag() {
        let parsed = Cli::try_parse_from(["ayurbot", "quiz", "--quiz", "daily-traits"])
            .expect("should parse");
        assert!(matches!(
            parsed.command,
            Commands::Quiz {
                quiz: Some(QuizKind::DailyTraits)
            }
        ));
    }

    #[test]
    fn unknown_quiz_kind_is_rejected() {
        let cli = Cli::try_parse_from(["ayurbot", "chat", "--quiz", "astrology"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::InvalidValue));
    }

    #[test]
    fn global_config_dir() {
        let parsed = Cli::try_parse_from(["ayurbot", "chat", "--config-dir", "/tmp/ayurbot"])
            .expect("should parse");
        assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/ayurbot")));

        let parsed = Cli::try_parse_from(["ayurbot", "--config-dir", "/tmp/ayurbot", "status"])
            .expect("should parse");
        assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/ayurbot")));
    }

    #[test]
    fn config_show_flag() {
        let parsed = Cli::try_parse_from(["ayurbot", "config", "--show"]).expect("should parse");
        assert!(matches!(parsed.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["ayurbot", "serve"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::InvalidSubcommand));
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["ayurbot", "--help"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::DisplayHelp));
    }
}
