//! Interactive browser over the API, using dialoguer.
//!
//! Three pages mirror the web client: upload, summary and history. The
//! session's current document is passed explicitly to each page.

use crate::client::ApiClient;
use crate::document::DocumentView;
use crate::export::{self, ExportFormat};
use crate::session::{DetailView, Session};
use colored::Colorize;
use dialoguer::{Input, Select};
use std::path::PathBuf;

const MENU: [&str; 4] = ["Upload document", "Summary", "History", "Quit"];

/// Run the interactive loop until the user quits
pub async fn run(client: &ApiClient) -> anyhow::Result<()> {
    let mut session = Session::new();

    loop {
        let choice = Select::new()
            .with_prompt("AI Document Summarizer")
            .items(&MENU)
            .default(0)
            .interact_opt()?;

        let result = match choice {
            Some(0) => upload_page(client, &mut session).await,
            Some(1) => summary_page(client, &mut session).await,
            Some(2) => history_page(client, &mut session).await,
            _ => break,
        };

        if let Err(e) = result {
            eprintln!("{} {}\n", "Error:".red().bold(), e);
        }
    }

    Ok(())
}

async fn upload_page(client: &ApiClient, session: &mut Session) -> anyhow::Result<()> {
    let path: String = Input::new()
        .with_prompt("File (pdf, docx or txt)")
        .interact_text()?;
    let title: String = Input::new().with_prompt("Document title").interact_text()?;

    println!("{}", "Generating summary...".dimmed());
    let document = client.upload(&PathBuf::from(path.trim()), &title).await?;
    session.set_current(document.clone());

    show_document(client, &document).await
}

async fn summary_page(client: &ApiClient, session: &mut Session) -> anyhow::Result<()> {
    let current = match session.detail() {
        DetailView::Render(document) => Some(document.clone()),
        DetailView::RedirectToUpload => None,
    };

    let Some(document) = current else {
        println!("No summary available. Please upload a document first.\n");
        return upload_page(client, session).await;
    };
    show_document(client, &document).await
}

async fn history_page(client: &ApiClient, session: &mut Session) -> anyhow::Result<()> {
    let entries = client.list().await?;
    if entries.is_empty() {
        println!("No summaries available yet.\n");
        return Ok(());
    }

    let labels: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "{} (Generated on: {})",
                entry.title,
                entry.summary_date.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();

    let Some(index) = Select::new()
        .with_prompt("Summary History")
        .items(&labels)
        .default(0)
        .interact_opt()?
    else {
        return Ok(());
    };

    // History entries carry no summary text; fetch the full record
    let document = client.get(entries[index].id).await?;
    session.set_current(document.clone());
    show_document(client, &document).await
}

/// Print a summarized document and offer downloads
async fn show_document(client: &ApiClient, document: &DocumentView) -> anyhow::Result<()> {
    print_document(document);

    loop {
        let choice = Select::new()
            .items(&["Download as TXT", "Download as DOCX", "Back"])
            .default(0)
            .interact_opt()?;

        let format = match choice {
            Some(0) => ExportFormat::Txt,
            Some(1) => ExportFormat::Docx,
            _ => return Ok(()),
        };

        let bytes = client.download(document.id, format.extension()).await?;
        let path = PathBuf::from(export::file_name(&document.title, format));
        tokio::fs::write(&path, &bytes).await?;
        println!("Saved {} ({} bytes)\n", path.display().to_string().green(), bytes.len());
    }
}

pub fn print_document(document: &DocumentView) {
    println!("\n=== {} ===\n", document.title.bold());
    match &document.summary {
        Some(summary) => println!("{}\n", summary),
        None => println!("{} ({})\n", "No summary".yellow(), document.status),
    }
    if let Some(date) = document.summary_date {
        println!("Generated on: {}", date.format("%Y-%m-%d %H:%M"));
    }
    if let Some(failure) = &document.failure {
        println!("Failure: {}", failure.red());
    }
    println!("Document ID: {}\n", document.id);
}
