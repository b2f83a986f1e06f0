//! # askpdf CLI
//!
//! Command-line interface for grounded question answering over PDFs.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askpdf extract <pdfs>...` | Show the per-page text table of each PDF |
//! | `askpdf chunks <pdfs>...` | Show the chunk → page attribution table |
//! | `askpdf ask <question> --pdf <pdf>...` | Answer a question with citations |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect how a document chunks and which page each chunk maps to
//! askpdf chunks report.pdf
//!
//! # Ask a question across two documents
//! export OPENAI_API_KEY=sk-...
//! askpdf ask "What is professional scepticism?" --pdf ssa200.pdf --pdf ssa300.pdf
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use askpdf::config::{self, Config};
use askpdf::models::Citation;
use askpdf::pipeline::Session;
use askpdf::sources::DocumentHandle;

/// askpdf — ask natural-language questions against a set of PDFs and get
/// answers grounded in page-level citations.
#[derive(Parser)]
#[command(
    name = "askpdf",
    about = "Grounded question answering over PDF documents",
    version
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and print the per-page text of each PDF.
    Extract {
        /// PDF files to extract.
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,
    },

    /// Print the chunk table with attributed pages for each PDF.
    Chunks {
        /// PDF files to chunk.
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,
    },

    /// Answer a question against the given PDFs.
    Ask {
        /// The question to answer.
        question: String,

        /// PDF files forming the knowledge base.
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,

        /// OpenAI API key; falls back to the OPENAI_API_KEY environment
        /// variable.
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Extract { pdfs } => run_extract(config, &pdfs),
        Commands::Chunks { pdfs } => run_chunks(config, &pdfs),
        Commands::Ask {
            question,
            pdfs,
            api_key,
        } => run_ask(config, &question, &pdfs, api_key).await,
    }
}

fn handles(pdfs: &[PathBuf]) -> Vec<DocumentHandle> {
    pdfs.iter()
        .map(|path| {
            let handle = DocumentHandle::from_path(path);
            // Title by file name, the way citations are expected to read.
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => handle.with_name(name),
                None => handle,
            }
        })
        .collect()
}

/// Session for the inspection commands: no credential (they stop before
/// any service call) and unreadable files warn instead of aborting.
fn inspection_session(mut config: Config, pdfs: &[PathBuf]) -> Session {
    config.extraction.skip_unreadable = true;
    let mut session = Session::new(config);
    session.configure(handles(pdfs), "");
    session
}

fn warn_failures(session: &Session) {
    for failure in session.extraction_failures() {
        eprintln!("warning: {}: {}", failure.title, failure.reason);
    }
}

fn run_extract(config: Config, pdfs: &[PathBuf]) -> Result<()> {
    let mut session = inspection_session(config, pdfs);
    session.extract()?;
    warn_failures(&session);

    let Some(documents) = session.documents() else {
        bail!("no documents could be extracted");
    };
    if documents.is_empty() {
        bail!("no documents could be extracted");
    }

    for (title, doc) in documents {
        println!("{} ({} pages, {} chars)", title, doc.page_count(), doc.full_text.len());
        for (page, text) in &doc.text_by_page {
            let preview: String = text.chars().take(72).collect();
            println!("  page {:>3}: {} chars  \"{}\"", page, text.len(), preview.replace('\n', " "));
        }
        println!();
    }
    Ok(())
}

fn run_chunks(config: Config, pdfs: &[PathBuf]) -> Result<()> {
    let mut session = inspection_session(config, pdfs);
    session.chunk()?;
    warn_failures(&session);

    let Some(chunked) = session.chunked() else {
        bail!("no documents could be extracted");
    };
    if chunked.is_empty() {
        bail!("no documents could be extracted");
    }

    for (title, doc) in chunked {
        let pages = doc.chunk_to_page();
        println!("{} ({} chunks)", title, pages.len());
        for chunk in &doc.chunks {
            let page = pages.get(&chunk.ordinal).copied().unwrap_or(chunk.page);
            let preview: String = chunk.text.chars().take(60).collect();
            println!(
                "  chunk {:>3} → page {:>3}  \"{}\"",
                chunk.ordinal,
                page,
                preview.replace('\n', " ")
            );
        }
        println!();
    }
    Ok(())
}

async fn run_ask(
    config: Config,
    question: &str,
    pdfs: &[PathBuf],
    api_key: Option<String>,
) -> Result<()> {
    let credential = match api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok()) {
        Some(key) if !key.is_empty() => key,
        _ => bail!(
            "No API key. Pass --api-key or set the OPENAI_API_KEY environment variable."
        ),
    };

    let mut session = Session::new(config);
    session.configure(handles(pdfs), credential);

    let record = session.ask(question).await?;

    println!("{}", record.answer);
    println!();
    println!("{}", format_sources(&record.citations));
    Ok(())
}

/// Render citations grouped by document: `Sources: a.pdf (page 1, 2), b.pdf (page 1)`.
fn format_sources(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "Sources: none".to_string();
    }

    let mut grouped: Vec<(String, Vec<u32>)> = Vec::new();
    for citation in citations {
        match grouped.last_mut() {
            Some((title, pages)) if *title == citation.source => pages.push(citation.page),
            _ => grouped.push((citation.source.clone(), vec![citation.page])),
        }
    }

    let parts: Vec<String> = grouped
        .iter()
        .map(|(title, pages)| {
            let pages_str = pages
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} (page {})", title, pages_str)
        })
        .collect();

    format!("Sources: {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_line_groups_pages_per_document() {
        let citations = vec![
            Citation {
                source: "a.pdf".into(),
                page: 1,
            },
            Citation {
                source: "a.pdf".into(),
                page: 2,
            },
            Citation {
                source: "b.pdf".into(),
                page: 1,
            },
        ];
        assert_eq!(
            format_sources(&citations),
            "Sources: a.pdf (page 1, 2), b.pdf (page 1)"
        );
    }

    #[test]
    fn sources_line_handles_empty() {
        assert_eq!(format_sources(&[]), "Sources: none");
    }

    #[test]
    fn documents_are_titled_by_file_name() {
        let hs = handles(&[PathBuf::from("/docs/q3/report.pdf")]);
        assert_eq!(hs[0].title(), "report.pdf");
    }
}
