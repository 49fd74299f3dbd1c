use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::AyurbotError;
use crate::config::Config;
use crate::database::VectorStore;
use crate::dosha::{Dosha, DoshaScore, Quiz, QuizKind};
use crate::embeddings::OllamaClient;
use crate::knowledge::KnowledgeBase;
use crate::session::{ChatService, InMemorySessionStore, SessionId, SessionStore, Speaker};

const RETAKE_COMMAND: &str = "/quiz";

/// Words that end the chat loop
#[inline]
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Ask every question of the quiz and return the chosen answer symbols in order
fn ask_quiz(quiz: &Quiz) -> Result<Vec<String>> {
    eprintln!(
        "{}",
        style("🌿 Answer a few questions to find your dosha").bold().cyan()
    );
    eprintln!();

    let mut answers = Vec::with_capacity(quiz.len());
    for (number, question) in quiz.questions().iter().enumerate() {
        let index = Select::new()
            .with_prompt(format!("{}. {}", number + 1, question.text))
            .items(&question.options)
            .default(0)
            .interact()?;

        let answer = question
            .answer_for(index)
            .context("Selected option has no answer")?;
        answers.push(answer.symbol().to_string());
    }

    Ok(answers)
}

fn print_score(answers: &[String], dosha: Dosha) {
    let score = DoshaScore::from_answers(answers);

    eprintln!();
    eprintln!(
        "Your dominant dosha is {}",
        style(dosha).bold().green()
    );
    for each in Dosha::ALL {
        eprintln!("  {:<6} {}", each.as_str(), score.count(each));
    }
    eprintln!();
}

/// Run the quiz on its own and report the result
#[inline]
pub fn run_quiz(kind: QuizKind) -> Result<Dosha> {
    let answers = ask_quiz(&Quiz::for_kind(kind))?;
    let dosha = crate::dosha::classify(&answers)?;
    print_score(&answers, dosha);
    Ok(dosha)
}

fn turn_spinner() -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Consulting the texts...");
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}

fn start_session(
    service: &ChatService<InMemorySessionStore>,
    existing: Option<SessionId>,
    kind: QuizKind,
) -> Result<SessionId> {
    let answers = ask_quiz(&Quiz::for_kind(kind))?;
    let (id, dosha) = service.complete_quiz(existing, &answers)?;
    print_score(&answers, dosha);
    Ok(id)
}

/// Take the quiz, then answer questions until the user leaves
#[inline]
pub async fn run_chat(config_dir: &Path, quiz: Option<QuizKind>) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let kind = quiz.unwrap_or(config.session.quiz);

    let client = OllamaClient::new(&config)?;
    let health_client = client.clone();
    tokio::task::spawn_blocking(move || health_client.health_check())
        .await
        .context("Health check task failed")?
        .context("Ollama is not ready. Is it running with the configured models pulled?")?;

    let store = VectorStore::new(&config)
        .await
        .context("Failed to open the passage index")?;
    if store.count_passages().await.unwrap_or(0) == 0 {
        warn!("Passage index is empty, answers will not be grounded in any text");
        eprintln!(
            "{}",
            style("⚠ The passage index is empty. Answers will have no supporting context.")
                .yellow()
        );
    }

    let knowledge = KnowledgeBase::new(client.clone(), Arc::new(store));
    let service = ChatService::new(
        InMemorySessionStore::new(),
        Arc::new(knowledge),
        Arc::new(client),
        config.session_options(),
    );

    let mut id = start_session(&service, None, kind)?;
    info!("Started chat session {}", id);

    eprintln!(
        "Ask about remedies, diet or routines. Type {} to retake the quiz, {} or {} to leave.",
        style(RETAKE_COMMAND).cyan(),
        style("exit").cyan(),
        style("quit").cyan()
    );

    loop {
        let input: String = Input::new()
            .with_prompt(Speaker::User.label())
            .allow_empty(true)
            .interact_text()?;

        if is_exit_command(&input) {
            break;
        }
        if input.trim() == RETAKE_COMMAND {
            id = start_session(&service, Some(id), kind)?;
            continue;
        }

        let expired = service.store().expire_idle(config.session_idle_timeout());
        if expired > 0 {
            info!("Expired {} idle sessions", expired);
        }

        let spinner = turn_spinner();
        let outcome = service.ask_with_sources(id, &input).await;
        spinner.finish_and_clear();

        match outcome {
            Ok(reply) => {
                eprintln!(
                    "{}: {}",
                    style(Speaker::Assistant.label()).bold().green(),
                    reply.answer
                );
                let citations = reply.citations();
                if !citations.is_empty() {
                    eprintln!("{}", style("Sources:").dim());
                    for citation in citations {
                        eprintln!("{}", style(format!("- {}", citation)).dim());
                    }
                }
                eprintln!();
            }
            Err(AyurbotError::SessionNotFound(_)) => {
                eprintln!(
                    "{}",
                    style("Your session expired after being idle. Let's retake the quiz.").yellow()
                );
                id = start_session(&service, None, kind)?;
            }
            Err(e) if e.is_turn_error() => {
                eprintln!("{} {}", style("✗").red(), e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Ok(history) = service.history(id) {
        info!("Chat ended after {} turns", history.turns().count());
    }
    service.end(id);
    eprintln!("Take care!");

    Ok(())
}

/// Report Ollama health and the size of the passage index
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("🩺 Ayurbot Status").bold().cyan());
    eprintln!();

    let client = OllamaClient::new(&config)?;
    eprintln!("Ollama at {}", style(client.base_url()).cyan());
    match tokio::task::spawn_blocking(move || client.health_check()).await? {
        Ok(()) => eprintln!(
            "  {} {} and {} available",
            style("✓").green(),
            config.ollama.chat_model,
            config.ollama.embedding_model
        ),
        Err(e) => eprintln!("  {} {:#}", style("✗").red(), e),
    }

    eprintln!();
    eprintln!(
        "Passage index at {}",
        style(config.vector_database_path().display()).cyan()
    );
    match VectorStore::new(&config).await {
        Ok(store) => {
            if !store.validate_integrity().await {
                eprintln!("  {} index cannot be read", style("✗").red());
            } else {
                match store.count_passages().await {
                    Ok(count) => eprintln!(
                        "  {} {} passages ({} dimensions)",
                        style("✓").green(),
                        count,
                        store.vector_dimension()
                    ),
                    Err(e) => eprintln!("  {} {}", style("✗").red(), e),
                }
            }
        }
        Err(e) => eprintln!("  {} {}", style("✗").red(), e),
    }

    Ok(())
}
