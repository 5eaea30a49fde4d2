use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use promptdesk::{
    capability::get_language_model,
    config::Config,
    extraction::{ExtractionPipeline, Record, sample_records},
    generation::{ClipboardError, CommandClipboard, Platform, PostGenerator, copy_post},
    logging,
    notes::{FileStorage, NoteStore, NotesEditor},
};

#[derive(Parser)]
#[command(
    name = "promptdesk-cli",
    about = "Run address extraction, post generation, and notes from the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill city, state, and PIN code for each customer record.
    Extract {
        /// JSON array of records; the built-in sample customers when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Where to write the updated records; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate LinkedIn, Twitter, and Instagram posts for a topic.
    Posts {
        topic: String,
        /// Copy one platform's post to the clipboard after generation.
        #[arg(long)]
        copy: Option<Platform>,
    },
    /// Manage saved notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
}

#[derive(Subcommand)]
enum NotesCommand {
    List,
    Save {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Update the note with this id instead of creating a new one.
        #[arg(long)]
        id: Option<String>,
    },
    Delete {
        id: String,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_cli_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Extract { input, output } => {
            let runtime = build_runtime()?;
            runtime.block_on(extract(&config, input.as_deref(), output.as_deref()))
        }
        Command::Posts { topic, copy } => {
            let runtime = build_runtime()?;
            runtime.block_on(posts(&config, &topic, copy))
        }
        Command::Notes { command } => notes(&config, command),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

async fn extract(config: &Config, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let mut records: Vec<Record> = match input {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse records in {}", path.display()))?
        }
        None => sample_records(),
    };

    let model = get_language_model(config)?;
    let pipeline = ExtractionPipeline::new(model)
        .with_throttle(Duration::from_millis(config.extraction_throttle_ms));
    let total = records.len();
    let report = pipeline
        .run_with_progress(&mut records, |index, record| {
            eprintln!(
                "[{}/{}] {}: {}, {} {}",
                index + 1,
                total,
                record.full_name(),
                record.city,
                record.state,
                record.pin_code
            );
        })
        .await?;

    let json = serde_json::to_string_pretty(&records)?;
    match output {
        Some(path) => fs::write(path, json.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    eprintln!(
        "extracted {} of {} records ({} failed)",
        report.succeeded, report.attempted, report.failed
    );
    if let Some(last_error) = report.last_error {
        eprintln!("{last_error}");
    }
    Ok(())
}

async fn posts(config: &Config, topic: &str, copy: Option<Platform>) -> Result<()> {
    let generator = PostGenerator::new(get_language_model(config)?);
    let posts = generator.generate(topic).await?;

    for (platform, text) in posts.sections() {
        println!("== {} ==", platform.name());
        println!("{text}\n");
    }

    if let Some(platform) = copy {
        let clipboard = config
            .clipboard_command
            .as_deref()
            .and_then(CommandClipboard::from_command_line)
            .ok_or(ClipboardError::NotConfigured)?;
        copy_post(&clipboard, &posts, platform).await?;
        eprintln!("{} post copied to clipboard", platform.name());
    }
    Ok(())
}

fn notes(config: &Config, command: NotesCommand) -> Result<()> {
    let store = NoteStore::new(FileStorage::new(&config.notes_dir));
    let mut editor = NotesEditor::open(store)?;

    match command {
        NotesCommand::List => {
            println!("{}", serde_json::to_string_pretty(editor.notes())?);
        }
        NotesCommand::Save { title, content, id } => {
            match id {
                Some(id) => {
                    if !editor.select(&id) {
                        bail!("no note with id {id}");
                    }
                }
                None => editor.new_note(),
            }
            if let Some(title) = title {
                editor.edit_title(title);
            }
            if let Some(content) = content {
                editor.edit_content(content);
            }
            match editor.save()? {
                Some(note) => println!("{}", serde_json::to_string_pretty(&note)?),
                None => eprintln!("nothing to save: title and content are both empty"),
            }
        }
        NotesCommand::Delete { id } => {
            editor.delete(&id)?;
            eprintln!("deleted {id}");
        }
    }
    Ok(())
}
