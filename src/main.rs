//! CLI entry point for `docpreview`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};

use docpreview::config::Config;
use docpreview::model::document::ParsedDocument;
use docpreview::model::preview::{Phase, RenderSource};
use docpreview::parser::mime::MimeParser;
use docpreview::preview::handles::{HandleStore, MemoryHandleStore};
use docpreview::preview::render::render_page;
use docpreview::preview::session::PreviewSession;
use docpreview::preview::source::{CommandConverter, LocalFileSource, MailConverter, NoConverter};

#[derive(Parser)]
#[command(
    name = "docpreview",
    version,
    about = "Preview documents and email messages: MIME parsing, inline images and attachments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a file in a preview session and print what would be displayed
    Preview {
        /// File to preview
        file: PathBuf,
        /// Directory that file keys are resolved against (defaults to the file's directory)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Write the rendered preview as an HTML page
        #[arg(long, value_name = "OUT")]
        html: Option<PathBuf>,
        /// Export visible attachments into this directory
        #[arg(long, value_name = "DIR")]
        extract: Option<PathBuf>,
    },
    /// Parse a raw message file and print its structure
    Parse {
        /// Message file (.eml or any RFC 822 text)
        file: PathBuf,
        #[arg(long)]
        json: bool,
        /// Export downloadable attachments into this directory
        #[arg(long, value_name = "DIR")]
        extract: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = docpreview::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Preview {
            file,
            root,
            html,
            extract,
        } => cmd_preview(&config, &file, root, html.as_deref(), extract.as_deref()).await,
        Commands::Parse {
            file,
            json,
            extract,
        } => cmd_parse(&config, &file, json, extract.as_deref()),
        Commands::InitConfig { force } => cmd_init_config(force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = docpreview::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "docpreview.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Split a CLI path into a source root and a key relative to it.
fn source_root_and_key(file: &Path, root: Option<PathBuf>) -> anyhow::Result<(PathBuf, String)> {
    match root {
        Some(root) => {
            let rel = file.strip_prefix(&root).unwrap_or(file);
            Ok((root, rel.to_string_lossy().into_owned()))
        }
        None => {
            let name = file
                .file_name()
                .with_context(|| format!("Not a file: {}", file.display()))?;
            let parent = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            Ok((parent.to_path_buf(), name.to_string_lossy().into_owned()))
        }
    }
}

async fn cmd_preview(
    config: &Config,
    file: &Path,
    root: Option<PathBuf>,
    html_out: Option<&Path>,
    extract: Option<&Path>,
) -> anyhow::Result<()> {
    let (root, key) = source_root_and_key(file, root)?;
    let name = Path::new(&key)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.clone());

    let converter: Arc<dyn MailConverter> = match &config.converter.command {
        Some(program) => Arc::new(CommandConverter::new(program)),
        None => Arc::new(NoConverter),
    };
    let store = Arc::new(MemoryHandleStore::new());
    let mut session = PreviewSession::new(
        Arc::new(LocalFileSource::new(root)),
        converter,
        store.clone(),
        config,
    );

    let state = session.open(&key, &name).await.clone();

    println!();
    println!("  {:<14} {}", "File", state.name);
    if let Some(category) = &state.category {
        println!("  {:<14} {}", "Category", category);
    }
    if !state.mime.is_empty() {
        println!("  {:<14} {}", "MIME type", state.mime);
    }

    if state.phase == Phase::Error {
        let message = state.error.as_deref().unwrap_or_default();
        println!("  {:<14} {}", "Error", message);
        println!();
        session.close();
        anyhow::bail!("{message}");
    }

    match &state.source {
        Some(RenderSource::DataUri(uri)) => {
            println!("  {:<14} data URI ({})", "Render", format_size(uri.len(), BINARY));
        }
        Some(RenderSource::Text(text)) => {
            println!("  {:<14} text ({} lines)", "Render", text.lines().count());
        }
        Some(RenderSource::Html(html)) => {
            println!("  {:<14} html ({})", "Render", format_size(html.len(), BINARY));
        }
        Some(RenderSource::Handle(handle)) => {
            let size = store.resolve(handle).map_or(0, |b| b.bytes.len());
            println!("  {:<14} {} ({})", "Render", handle, format_size(size, BINARY));
        }
        None => {}
    }

    if !state.attachments.is_empty() {
        println!();
        println!("  Attachments:");
        for link in &state.attachments {
            let size = store.resolve(&link.url).map_or(0, |b| b.bytes.len());
            println!(
                "    {:<40} {:<30} {:>10}",
                link.name,
                link.mime_type,
                format_size(size, BINARY)
            );
        }
    }
    println!();

    if let Some(out) = html_out {
        std::fs::write(out, render_page(&state))
            .with_context(|| format!("Failed to write '{}'", out.display()))?;
        println!("  Wrote preview page to {}", out.display());
    }

    if let Some(dir) = extract {
        let paths = docpreview::export::attachment::export_all_attachments(
            store.as_ref(),
            &state.attachments,
            dir,
        )?;
        println!("  Extracted {} attachment(s) to {}", paths.len(), dir.display());
    }

    let released = session.close();
    tracing::debug!(released, "Preview closed");
    Ok(())
}

fn cmd_parse(config: &Config, file: &Path, json: bool, extract: Option<&Path>) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("Failed to read '{}'", file.display()))?;
    let doc = MimeParser::new(config.preview.max_mime_depth).parse_bytes(&raw);

    if json {
        print_document_json(&doc)?;
    } else {
        print_document_table(file, &doc);
    }

    if let Some(dir) = extract {
        let paths = docpreview::export::attachment::export_document_attachments(&doc, dir)?;
        eprintln!("  Extracted {} attachment(s) to {}", paths.len(), dir.display());
    }
    Ok(())
}

/// Print a parsed document in a human-readable table.
fn print_document_table(file: &Path, doc: &ParsedDocument) {
    println!();
    println!("  {:<14} {}", "File", file.display());
    println!("  {:<14} {}", "HTML body", format_size(doc.html.len(), BINARY));
    println!("  {:<14} {}", "Text body", format_size(doc.text.len(), BINARY));
    println!("  {:<14} {}", "Attachments", doc.attachments.len());

    for att in &doc.attachments {
        let size = att.to_blob().bytes.len();
        let inline = match &att.content_id {
            Some(cid) => format!("inline <{cid}>"),
            None => String::new(),
        };
        println!(
            "    {:<40} {:<30} {:>10}  {}",
            att.filename,
            att.content_type,
            format_size(size, BINARY),
            inline
        );
    }
    println!();
}

/// Print a parsed document as JSON (payloads omitted).
fn print_document_json(doc: &ParsedDocument) -> anyhow::Result<()> {
    let attachments: Vec<serde_json::Value> = doc
        .attachments
        .iter()
        .map(|a| {
            serde_json::json!({
                "filename": a.filename,
                "content_type": a.content_type,
                "content_id": a.content_id,
                "size": a.to_blob().bytes.len(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "html": doc.html,
        "text": doc.text,
        "attachments": attachments,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_init_config(force: bool) -> anyhow::Result<()> {
    if let Some(path) = docpreview::config::config_file_path() {
        if path.exists() && !force {
            anyhow::bail!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }
    }
    let path = docpreview::config::save_config(&Config::default())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "docpreview", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
