
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, OllamaConfig, RetrievalConfig};
use crate::dosha::QuizKind;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Ayurbot Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the local Ollama instance that answers questions and embeds them for search.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Retrieval & Quiz").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;
    config.session.quiz = select_quiz(config.session.quiz)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before chatting.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!("  Max Tokens: {}", style(config.ollama.max_tokens).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.ollama.timeout_seconds).cyan()
    );

    eprintln!();
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Passages per question: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.retrieval.timeout_seconds).cyan()
    );
    eprintln!(
        "  Index: {}",
        style(config.vector_database_path().display()).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Session Settings:").bold().yellow());
    eprintln!("  Quiz: {}", style(quiz_label(config.session.quiz)).cyan());
    eprintln!(
        "  Idle timeout: {} minutes",
        style(config.session.idle_timeout_minutes).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::new(config_dir)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn quiz_label(kind: QuizKind) -> &'static str {
    match kind {
        QuizKind::BodyProfile => "body profile",
        QuizKind::DailyTraits => "daily traits",
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model (must match the index)")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let max_tokens: u32 = Input::new()
        .with_prompt("Maximum tokens per answer")
        .default(ollama.max_tokens)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=4096).contains(input) {
                Ok(())
            } else {
                Err("Max tokens must be between 1 and 4096")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_chat_model(chat_model)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_max_tokens(max_tokens)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Passages retrieved per question")
        .default(retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=10).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 10")
            }
        })
        .interact_text()?;

    retrieval.set_top_k(top_k)?;
    Ok(())
}

fn select_quiz(current: QuizKind) -> Result<QuizKind> {
    let kinds = [QuizKind::BodyProfile, QuizKind::DailyTraits];
    let labels: Vec<&str> = kinds.iter().map(|k| quiz_label(*k)).collect();
    let default_index = kinds.iter().position(|k| *k == current).unwrap_or(0);

    let index = Select::new()
        .with_prompt("Dosha quiz")
        .default(default_index)
        .items(&labels)
        .interact()?;

    Ok(kinds[index])
}

#[allow(clippy::ptr_arg, reason = "dialoguer validators receive &String")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
