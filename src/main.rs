use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::PathBuf;

mod app;
mod handler;
mod tui;
mod ui;

use diagramgen::{
    ai, logging, Config, DiagramSession, ExecutionReport, FeedbackSource, Overrides, Provider,
    Settings, WorkflowController,
};

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "diagramgen")]
#[command(about = "Turn architecture descriptions into diagrams with LLM-generated Python")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// LLM provider: openai, claude or ollama
    #[arg(short, long, global = true, value_parser = parse_provider)]
    provider: Option<Provider>,

    /// Model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Sampling temperature (0-2)
    #[arg(short, long, global = true)]
    temperature: Option<f32>,

    /// Python interpreter used to run the generated code
    #[arg(long, global = true)]
    python: Option<String>,

    /// Directory the diagram is written to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,
    /// Generate a diagram, then refine it from terminal prompts until you answer "ok"
    Generate {
        /// Architecture description
        description: String,
    },
    /// List models for the selected provider
    Models,
    /// Show resolved settings
    Config {
        /// Persist the provider/model/temperature/python/output-dir flags to the config file
        #[arg(long)]
        save: bool,
    },
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    Provider::from_str(s).ok_or_else(|| format!("unknown provider '{}' (openai, claude, ollama)", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    let overrides = Overrides {
        provider: cli.provider,
        model: cli.model.clone(),
        temperature: cli.temperature,
        python: cli.python.clone(),
        output_dir: cli.output_dir.clone(),
    };
    let settings = config.resolve(&overrides)?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            logging::init_file(&Config::config_dir()?.join("diagramgen.log"), cli.verbose)?;
            run_tui(&settings).await?
        }
        Commands::Generate { description } => {
            logging::init_stderr(cli.verbose)?;
            generate_interactive(&settings, &description).await?
        }
        Commands::Models => list_models(&settings).await?,
        Commands::Config { save } => show_config(config, &overrides, &settings, save)?,
    }

    Ok(())
}

async fn run_tui(settings: &Settings) -> Result<()> {
    let workflow = WorkflowController::from_settings(settings)?;
    let mut app = App::new(workflow, settings);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn event_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// Asks for feedback on stdin after every run.
struct TerminalFeedback;

impl FeedbackSource for TerminalFeedback {
    fn next_feedback(&mut self, report: &ExecutionReport) -> Result<String> {
        print_report(report);

        let feedback: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Would you like to modify the diagram? Describe the change, or type 'ok'")
            .allow_empty(true)
            .interact_text()?;
        Ok(feedback)
    }
}

fn print_report(report: &ExecutionReport) {
    if !report.output.is_empty() {
        println!("{}", report.output.dimmed());
    }
    if report.succeeded() {
        println!("✅ {}", report.summary().green());
    } else {
        println!("{}", report.summary().red());
    }
}

async fn generate_interactive(settings: &Settings, description: &str) -> Result<()> {
    let workflow = WorkflowController::from_settings(settings)?;

    // Same validation the UI applies before anything is sent
    let mut session = DiagramSession::new();
    let state = session.begin(description)?;

    println!(
        "🤖 Asking {} to draw your architecture...\n",
        format!("{}:{}", settings.provider, settings.model).bold().magenta()
    );

    let state = workflow.run(state, &mut TerminalFeedback).await?;

    println!("\n{}", "=".repeat(50).dimmed());
    println!("{} iteration(s)", state.iteration.to_string().bold());
    match workflow.artifacts().info() {
        Some(image) => println!("📐 Final diagram: {}", image.path.display().to_string().bold().green()),
        None => println!("{}", "No diagram was produced".red()),
    }

    Ok(())
}

async fn list_models(settings: &Settings) -> Result<()> {
    println!(
        "\n{}",
        format!("🤖 Models for {}", settings.provider.display_name()).bold().blue()
    );
    println!("{}", "=".repeat(30).dimmed());

    match ai::list_models(settings).await {
        Ok(models) if models.is_empty() => {
            println!("{}", "No models found. Pull one with: ollama pull qwen2.5-coder".yellow());
        }
        Ok(models) => {
            for model in models {
                let marker = if model == settings.model { "*" } else { " " };
                println!(" {} {}", marker, model.green());
            }
        }
        Err(e) => {
            println!("{}: {}", "Error listing models".red(), e);
            if settings.provider == Provider::Ollama {
                println!("Make sure Ollama is running: {}", "ollama serve".bold());
            }
        }
    }

    Ok(())
}

fn show_config(mut config: Config, overrides: &Overrides, settings: &Settings, save: bool) -> Result<()> {
    let path = Config::get_config_path()?;

    if save {
        if let Some(provider) = overrides.provider {
            config.provider = Some(provider.as_str().to_string());
        }
        if let Some(model) = &overrides.model {
            config.model = Some(model.clone());
        }
        if let Some(temperature) = overrides.temperature {
            config.temperature = Some(temperature);
        }
        if let Some(python) = &overrides.python {
            config.python = Some(python.clone());
        }
        if let Some(dir) = &overrides.output_dir {
            config.output_dir = Some(dir.clone());
        }
        config.save()?;
        println!("{} {}", "Saved".green(), path.display());
    }

    let key = match settings.key_source() {
        Some(source) => format!("set ({})", source),
        None => "missing".red().to_string(),
    };

    println!("{}", "⚙️  Settings".bold().blue());
    println!("  config file  {}", path.display());
    println!("  provider     {}", settings.provider.display_name());
    println!("  model        {}", settings.model);
    println!("  temperature  {}", settings.temperature);
    println!("  api key      {}", key);
    println!("  python       {}", settings.python);
    println!("  output       {}", settings.output_dir.display());
    println!("  timeout      {}s", settings.exec_timeout.as_secs());

    Ok(())
}
