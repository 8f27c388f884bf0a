//! PrepPal CLI - study a PDF from the terminal
//!
//! Usage: preppal-cli [OPTIONS] <COMMAND>
//!
//! Loads a document into an in-memory session, then asks questions or
//! generates study material with the configured model.

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use preppal_lib::config::{self, Settings};
use preppal_lib::context;
use preppal_lib::db::Database;
use preppal_lib::doc_processor;
use preppal_lib::llm::Provider;
use preppal_lib::session::{ChatMessage, Mode, Role};
use preppal_lib::views::{DerivedView, MindMapNode};
use preppal_lib::workspace::{Workspace, WorkspaceError};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "preppal-cli", version, about = "Study assistant for PDF textbooks")]
struct Cli {
    /// Model to use, e.g. gemini/gemini-2.5-flash or ollama/llama3
    #[arg(long, global = true)]
    model: Option<String>,

    /// Directory holding the settings database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DocArgs {
    /// PDF file to load
    file: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted page chunks
    Pages(DocArgs),
    /// Print the context string sent to the model
    Context {
        file: PathBuf,
        /// Override the configured context budget
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Ask a single question about a document
    Ask {
        #[command(flatten)]
        doc: DocArgs,
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive question/answer session
    Chat { file: PathBuf },
    /// Generate practice questions
    Practice(DocArgs),
    /// Generate a glossary of key terms
    Glossary(DocArgs),
    /// Generate flashcards
    Flashcards(DocArgs),
    /// Generate a mind map
    Mindmap(DocArgs),
    /// Manage settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all settings (API keys masked)
    Get,
    /// Store a setting
    Set { key: String, value: String },
    /// Remove a stored setting
    Unset { key: String },
    /// List models available with the configured keys
    Models,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(config::default_data_dir);
    let db = Database::new(&data_dir)
        .with_context(|| format!("opening settings in {:?}", data_dir))?;
    let settings = Settings::new(&db);

    match cli.command {
        Commands::Pages(doc) => {
            let document = doc_processor::load_document(&doc.file)?;
            if doc.json {
                println!("{}", serde_json::to_string_pretty(&document.chunks)?);
            } else {
                for chunk in &document.chunks {
                    println!("── Page {} ──\n{}\n", chunk.page_number, chunk.content);
                }
            }
        }
        Commands::Context { file, max_chars } => {
            let document = doc_processor::load_document(&file)?;
            let budget = match max_chars {
                Some(n) => n,
                None => settings.max_context_chars()?,
            };
            let assembled = context::assemble_within(&document.chunks, budget);
            println!("{}", assembled.text);
            if assembled.is_truncated() {
                eprintln!(
                    "\n[{} of {} pages omitted to stay within {} chars]",
                    assembled.omitted_pages.len(),
                    document.chunks.len(),
                    budget
                );
            }
        }
        Commands::Ask { doc, question } => {
            let (provider, model) = resolve(&settings, cli.model.as_deref())?;
            let mut ws = open_workspace(&settings, &doc.file).await?;
            let result = ws.ask(&provider, &model, &question.join(" ")).await;
            let answer = ws.session().messages().last();
            match (result, answer) {
                (Ok(()), Some(message)) if doc.json => {
                    println!("{}", serde_json::to_string_pretty(message)?)
                }
                (Ok(()), Some(message)) => print_message(message),
                (Ok(()), None) => {}
                (Err(WorkspaceError::Query(e)), _) => {
                    eprintln!("{}", ws.session().error().unwrap_or_default());
                    return Err(e.into());
                }
                (Err(e), _) => return Err(e.into()),
            }
        }
        Commands::Chat { file } => {
            let (provider, model) = resolve(&settings, cli.model.as_deref())?;
            let mut ws = open_workspace(&settings, &file).await?;
            chat_loop(&mut ws, &provider, &model).await?;
        }
        Commands::Practice(doc) => generate(&settings, cli.model.as_deref(), doc, Mode::Practice).await?,
        Commands::Glossary(doc) => generate(&settings, cli.model.as_deref(), doc, Mode::Glossary).await?,
        Commands::Flashcards(doc) => {
            generate(&settings, cli.model.as_deref(), doc, Mode::Flashcards).await?
        }
        Commands::Mindmap(doc) => generate(&settings, cli.model.as_deref(), doc, Mode::MindMap).await?,
        Commands::Config { action } => match action {
            ConfigAction::Get => {
                let mut entries: Vec<_> = settings.masked()?.into_iter().collect();
                entries.sort();
                for (key, value) in entries {
                    println!("{} = {}", key, value);
                }
                println!("model = {}", settings.default_model()?);
            }
            ConfigAction::Set { key, value } => {
                settings.set(&key, &value)?;
                println!("Saved {}", key);
            }
            ConfigAction::Unset { key } => {
                settings.delete(&key)?;
                println!("Removed {}", key);
            }
            ConfigAction::Models => {
                for model in settings.available_models()? {
                    println!("{:<40} {} ({})", model.id, model.name, model.provider);
                }
            }
        },
    }

    Ok(())
}

fn resolve(settings: &Settings, model: Option<&str>) -> Result<(Provider, String)> {
    let model = match model {
        Some(m) => m.to_string(),
        None => settings.default_model()?,
    };
    Ok(settings.resolve_provider(&model)?)
}

async fn open_workspace(settings: &Settings<'_>, file: &Path) -> Result<Workspace> {
    let mut ws = Workspace::new().with_context_budget(settings.max_context_chars()?);
    match ws.upload(file).await {
        Ok(()) => log::info!(
            "Loaded {:?} ({} pages)",
            file,
            ws.session().snapshot().page_count
        ),
        Err(e) => {
            eprintln!("{}", ws.session().error().unwrap_or_default());
            return Err(e.into());
        }
    }
    Ok(ws)
}

async fn generate(settings: &Settings<'_>, model: Option<&str>, doc: DocArgs, mode: Mode) -> Result<()> {
    let (provider, model) = resolve(settings, model)?;
    let mut ws = open_workspace(settings, &doc.file).await?;
    ws.switch_mode(mode);
    let view = ws
        .generate_view(&provider, &model)
        .await?
        .ok_or_else(|| anyhow!("view was discarded"))?;
    if doc.json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        print_view(view);
    }
    Ok(())
}

async fn chat_loop(ws: &mut Workspace, provider: &Provider, model: &str) -> Result<()> {
    if let Some(greeting) = ws.session().messages().first() {
        print_message(greeting);
    }
    println!("Type a question, or :mode <qa|practice|glossary|flashcards|mindmap>, :load <file>, :reset, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        } else if line == ":quit" || line == ":q" {
            break;
        } else if line == ":reset" {
            ws.reset();
            println!("Session cleared. Load a document with :load <file>.");
        } else if let Some(path) = line.strip_prefix(":load ") {
            match ws.upload(Path::new(path.trim())).await {
                Ok(()) => {
                    let snapshot = ws.session().snapshot();
                    println!(
                        "Loaded {} ({} pages)",
                        snapshot.file_name.unwrap_or_default(),
                        snapshot.page_count
                    );
                }
                Err(e) => {
                    log::debug!("load failed: {}", e);
                    println!("{}", ws.session().error().unwrap_or_default());
                }
            }
        } else if let Some(mode) = line.strip_prefix(":mode ") {
            let mode: Mode = match mode.parse() {
                Ok(m) => m,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            ws.switch_mode(mode);
            if mode == Mode::Qa {
                continue;
            }
            match ws.generate_view(provider, model).await.map(|v| v.cloned()) {
                Ok(Some(view)) => print_view(&view),
                Ok(None) => {}
                Err(WorkspaceError::Query(_)) => {
                    println!("{}", ws.session().error().unwrap_or_default())
                }
                Err(e) => println!("{}", e),
            }
        } else {
            if ws.session().mode() != Mode::Qa {
                ws.switch_mode(Mode::Qa);
            }
            match ws.ask(provider, model, line).await {
                Ok(()) | Err(WorkspaceError::Query(_)) => {
                    if let Some(last) = ws.session().messages().last() {
                        print_message(last);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }
    }

    Ok(())
}

fn print_message(message: &ChatMessage) {
    let speaker = match (message.role, message.is_error) {
        (Role::User, _) => "You",
        (Role::Model, true) => "Error",
        (Role::Model, false) => "PrepPal",
    };
    println!("{}: {}", speaker, message.content);
    if let Some(source) = &message.source {
        match source.page_number {
            Some(page) => println!("  Source (page {}): \"{}\"", page, source.content),
            None => println!("  Source: \"{}\"", source.content),
        }
    }
}

fn page_suffix(page: Option<u32>) -> String {
    page.map(|p| format!(" (p. {})", p)).unwrap_or_default()
}

fn print_view(view: &DerivedView) {
    match view {
        DerivedView::Practice(questions) => {
            for (i, q) in questions.iter().enumerate() {
                let kind = serde_json::to_value(q.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                println!("{}. [{}] {}", i + 1, kind, q.question);
                for (letter, option) in ('a'..='z').zip(q.options.iter().flatten()) {
                    println!("   {}) {}", letter, option);
                }
                println!("   Answer: {}\n", q.answer);
            }
        }
        DerivedView::Glossary(terms) => {
            for term in terms {
                println!("{}{}: {}", term.term, page_suffix(term.page_number), term.definition);
            }
        }
        DerivedView::Flashcards(cards) => {
            for (i, card) in cards.iter().enumerate() {
                println!("Card {}{}", i + 1, page_suffix(card.page_number));
                println!("  Front: {}", card.term);
                println!("  Back:  {}\n", card.definition);
            }
        }
        DerivedView::MindMap(root) => print_mind_map(root, 0),
    }
}

fn print_mind_map(node: &MindMapNode, depth: usize) {
    println!("{}{} {}", "  ".repeat(depth), if depth == 0 { "#" } else { "-" }, node.label);
    for child in &node.children {
        print_mind_map(child, depth + 1);
    }
}
