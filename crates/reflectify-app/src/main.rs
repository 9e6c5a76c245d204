//! Reflectify application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the text generator (Gemini, or the offline mock)
//! 4. Run the requested task through the interaction engine

mod cli;
mod render;

use std::error::Error;
use std::io::Read;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use reflectify_client::{GeminiClient, MockTextGenerator, TextGenerator};
use reflectify_core::{Mood, ReflectifyConfig};
use reflectify_engine::{EngineError, InteractionEngine};

use cli::{ChatInput, CliArgs, Command};
use render::{render_analysis, render_notice, render_turn};

/// Offline reply for expression and chat.
const MOCK_REPLY: &str = "Thank you for sharing that with me. It sounds like a lot is on \
                          your mind right now, and it makes sense to feel the way you do. \
                          Maybe take a few slow breaths and give yourself some credit for \
                          noticing how you feel.";

/// Offline reply for content analysis.
const MOCK_ANALYSIS: &str = r#"{"toxicity": 0.04, "insult": 0.02, "profanity": 0.01, "identity_attack": 0.0, "threat": 0.0, "overall": "safe", "summary": "Offline mode: canned analysis, the content was not sent anywhere."}"#;

/// Text from positional words, or all of stdin when there are none.
fn input_text(words: &[String]) -> std::io::Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

/// Print the notice for a failed task and exit non-zero.
fn fail(err: &EngineError) -> ! {
    eprintln!("{}", render_notice(&err.notice()));
    std::process::exit(1);
}

async fn run_express<G: TextGenerator>(
    engine: &InteractionEngine<G>,
    words: &[String],
) -> Result<(), Box<dyn Error>> {
    let text = input_text(words)?;
    match engine.submit_expression(&text).await {
        Ok(result) => println!("{}", result.reply),
        Err(e) => fail(&e),
    }
    Ok(())
}

async fn run_analyze<G: TextGenerator>(
    engine: &InteractionEngine<G>,
    words: &[String],
) -> Result<(), Box<dyn Error>> {
    let text = input_text(words)?;
    match engine.analyze_content(&text).await {
        Ok(record) => println!("{}", render_analysis(&record)),
        Err(e) => fail(&e),
    }
    Ok(())
}

/// Line-oriented chat loop over stdin.
async fn run_chat<G: TextGenerator>(
    engine: &InteractionEngine<G>,
    mood: Mood,
) -> Result<(), Box<dyn Error>> {
    let view = match engine.select_mood(mood) {
        Ok(view) => view,
        Err(e) => fail(&e),
    };
    for turn in view.turns() {
        println!("{}", render_turn(turn));
    }
    println!("(type /mood <happy|neutral|sad>, /reset or /quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ChatInput::parse(&line) {
            ChatInput::Blank => continue,
            ChatInput::Quit => break,
            ChatInput::Reset => {
                engine.reset_chat()?;
                println!("Conversation cleared. Pick a mood with /mood <happy|neutral|sad>.");
            }
            ChatInput::Mood(label) => {
                let selected = label
                    .parse::<Mood>()
                    .map_err(|_| EngineError::UnsetMood)
                    .and_then(|m| engine.select_mood(m));
                match selected {
                    Ok(view) => {
                        for turn in view.turns() {
                            println!("{}", render_turn(turn));
                        }
                    }
                    Err(e) => eprintln!("{}", render_notice(&e.notice())),
                }
            }
            ChatInput::Say(text) => match engine.submit_chat_turn(&text).await {
                Ok(turn) => println!("{}", render_turn(&turn)),
                Err(EngineError::StateLock(msg)) => return Err(msg.into()),
                Err(e) => eprintln!("{}", render_notice(&e.notice())),
            },
            ChatInput::Unknown(name) => {
                eprintln!("Unknown command /{}. Try /mood, /reset or /quit.", name)
            }
        }
    }

    tracing::info!(
        turns = engine.conversation()?.turns().len(),
        "Chat session ended"
    );
    Ok(())
}

async fn run<G: TextGenerator>(
    engine: InteractionEngine<G>,
    command: &Command,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Express { text } => run_express(&engine, text).await,
        Command::Analyze { text, .. } => run_analyze(&engine, text).await,
        Command::Chat { mood } => run_chat(&engine, *mood).await,
    }
}

fn analysis_retries(command: &Command) -> u32 {
    match command {
        Command::Analyze { retries, .. } => *retries,
        _ => 0,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    // Config (read before tracing so its log level can apply).
    let config_file = args.resolve_config_path();
    let loaded = ReflectifyConfig::load_or_default(&config_file);
    let config_level = loaded.as_ref().ok().map(|c| c.general.log_level.as_str());

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_level(config_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Reflectify v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            tracing::debug!(path = %config_file.display(), "Configuration ready");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults");
            ReflectifyConfig::default()
        }
    };

    let retries = analysis_retries(&args.command);

    if args.mock {
        let reply = match args.command {
            Command::Analyze { .. } => MOCK_ANALYSIS,
            _ => MOCK_REPLY,
        };
        tracing::info!("Using offline mock generator");
        let engine = InteractionEngine::new(MockTextGenerator::replying(reply))
            .with_analysis_retries(retries);
        return run(engine, &args.command).await;
    }

    let api_key = match config.service.resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "No API key available");
            eprintln!(
                "Set {} to your Gemini API key, or pass --mock to run offline.",
                config.service.api_key_env
            );
            return Err(e.into());
        }
    };
    let client = GeminiClient::from_config(&config.service, api_key)?;
    tracing::info!(
        model = %config.service.model,
        timeout_secs = config.service.request_timeout_secs,
        "Gemini client ready"
    );

    let engine = InteractionEngine::new(client).with_analysis_retries(retries);
    run(engine, &args.command).await
}
