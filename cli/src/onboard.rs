use anyhow::Result;
use console::style;
use dialoguer::{Input, Select};
use visor_core::config::Config;

const BANNER: &str = r"
    -------------------------------------

    v i s o r  —  see, detect, annotate

    -------------------------------------
";

const MODEL_CHOICES: &[&str] = &["gpt-4o", "gpt-4o-mini", "custom"];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", BANNER);
    println!("Let's set up your configuration.");

    print_step(1, 3, "API key");
    let api_key: String = Input::new()
        .with_prompt("API key for your model provider")
        .interact_text()?;

    print_step(2, 3, "Model");
    let selection = Select::new()
        .with_prompt("Which model should visor use?")
        .items(MODEL_CHOICES)
        .default(0)
        .interact()?;
    let model = if MODEL_CHOICES[selection] == "custom" {
        Input::new().with_prompt("Model name").interact_text()?
    } else {
        MODEL_CHOICES[selection].to_string()
    };

    print_step(3, 3, "Endpoint");
    let base_url: String = Input::new()
        .with_prompt("Base URL (empty for the OpenAI default)")
        .allow_empty(true)
        .interact_text()?;

    let config = Config {
        api_key,
        base_url: if base_url.trim().is_empty() {
            None
        } else {
            Some(base_url.trim().to_string())
        },
        model,
        ..Config::default()
    };

    std::fs::create_dir_all(&config.workspace_dir)?;

    println!();
    println!("{}", style("✔ Configuration complete").green().bold());

    Ok(config)
}
