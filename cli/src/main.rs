use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use visor_core::config;
use visor_core::providers::OpenAiProvider;
use visor_core::tools::{DetectBoundingBoxTool, DrawBoundingBoxTool};
use visor_core::{Agent, Message, ToolRegistry, ToolSpec};

mod onboard;

#[derive(Parser)]
#[command(name = "visor")]
#[command(about = "visor - A tool-calling vision agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat { message: None }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Chat { message } => {
            let config = config::load_config()?;

            let mut provider = OpenAiProvider::new(config.api_key.clone());
            provider = provider.with_model(config.model.clone());
            if let Some(base_url) = config.base_url.clone() {
                provider = provider.with_base_url(base_url);
            }
            let provider = Arc::new(provider);

            if !config.workspace_dir.exists()
                && let Err(e) = std::fs::create_dir_all(&config.workspace_dir)
            {
                eprintln!(
                    "❌ Error: Could not create workspace at {}: {}",
                    config.workspace_dir.display(),
                    e
                );
                return Err(e.into());
            }

            let registry = ToolRegistry::from_tools(vec![
                Arc::new(DetectBoundingBoxTool::new(provider.clone())),
                Arc::new(DrawBoundingBoxTool::new()),
            ])?;

            let system_prompt = build_system_prompt(&registry.specs());
            let mut agent = Agent::new(provider, registry).with_system_prompt(system_prompt);

            if let Some(msg) = message {
                println!("\n🔍 Processing...\n");
                let response = agent
                    .run(vec![Message::user(msg)], config.max_iterations)
                    .await;
                println!("{}", response.content);
            } else {
                println!("👁  visor");
                println!("Type your message (Ctrl+D to exit):\n");
                use std::io::{self, BufRead, Write};
                let stdin = io::stdin();
                let stdout = io::stdout();
                let mut stdout_lock = stdout.lock();

                loop {
                    print!("> ");
                    let _ = stdout_lock.flush();

                    let mut input = String::new();
                    let mut reader = stdin.lock();

                    match reader.read_line(&mut input) {
                        Ok(0) => {
                            println!("\n👋 Goodbye!");
                            break;
                        }
                        Ok(_) => {
                            let input = input.trim();
                            if input.is_empty() {
                                continue;
                            }

                            println!("\n🔍 Processing...\n");

                            let response = agent
                                .run(vec![Message::user(input)], config.max_iterations)
                                .await;
                            println!("{}\n", response.content);
                        }
                        Err(_) => {
                            println!("\n👋 Goodbye!");
                            break;
                        }
                    }
                }
            }

            if !agent.conversation().is_empty() {
                match agent.save_conversation(&config.conversations_dir()) {
                    Ok(path) => println!("💾 Conversation saved to {}", path.display()),
                    Err(e) => eprintln!("❌ Could not save conversation: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn build_system_prompt(specs: &[ToolSpec]) -> String {
    use std::fmt::Write;

    let mut prompt = String::from(
        "You are visor, an assistant that analyzes and annotates images with tools.\n\n\
         Respond with exactly one JSON object per turn, either\n\
         {\"type\": \"tool_use\", \"tool_uses\": [{\"name\": \"...\", \"params\": {...}}]}\n\
         to invoke tools, or\n\
         {\"type\": \"text\", \"text\": \"...\"}\n\
         for your final answer. Tool results arrive in the next turn.\n\n\
         Available tools:\n",
    );

    for spec in specs {
        let _ = writeln!(
            prompt,
            "- {}: {}\n  Parameters: {}",
            spec.name, spec.description, spec.parameters
        );
    }

    prompt
}
