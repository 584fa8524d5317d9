//! Line-oriented front end over stdin.
//!
//! Lines starting with `:` are commands; anything else is a question about
//! the selected document.

use crate::commands::{chat, knowledge, settings};
use crate::coordinator::SessionCoordinator;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{ConversationTurn, Document, TurnRole};
use crate::session::UploadPhase;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
:docs                 list documents
:refresh              reload the document list
:refresh <id>         reload one document
:upload <path>        upload a PDF
:select <id>|none     pick the document to ask about
:delete <id>          delete a document
:turns                show the conversation
:settings             show saved settings
:set <key> <value>    save a setting (applies on next start)
:unset <key>          remove a saved setting
:health               check the service
:quit                 exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Docs,
    Refresh(Option<String>),
    Upload(String),
    Select(Option<String>),
    Delete(String),
    Turns,
    Settings,
    Set(String, String),
    Unset(String),
    Health,
    Help,
    Quit,
    Ask(String),
}

/// `Ok(None)` for blank lines; `Err` carries a usage hint.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Some(ShellCommand::Ask(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let required = |usage: &str| -> Result<String, String> {
        if arg.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(arg.to_string())
        }
    };

    let command = match name {
        "docs" => ShellCommand::Docs,
        "refresh" => ShellCommand::Refresh((!arg.is_empty()).then(|| arg.to_string())),
        "upload" => ShellCommand::Upload(required(":upload <path>")?),
        "select" => match required(":select <id>|none")?.as_str() {
            "none" => ShellCommand::Select(None),
            id => ShellCommand::Select(Some(id.to_string())),
        },
        "delete" => ShellCommand::Delete(required(":delete <id>")?),
        "turns" => ShellCommand::Turns,
        "settings" => ShellCommand::Settings,
        "set" => {
            let arg = required(":set <key> <value>")?;
            match arg.split_once(char::is_whitespace) {
                Some((key, value)) => ShellCommand::Set(key.to_string(), value.trim().to_string()),
                None => return Err("usage: :set <key> <value>".into()),
            }
        }
        "unset" => ShellCommand::Unset(required(":unset <key>")?),
        "health" => ShellCommand::Health,
        "help" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command :{other} (try :help)")),
    };
    Ok(Some(command))
}

fn document_line(doc: &Document, selected: bool) -> String {
    format!(
        "{} [{}] {} ({} pages, {} chunks, {})",
        if selected { "*" } else { " " },
        doc.id,
        doc.filename,
        doc.page_count,
        doc.chunk_count,
        doc.upload_time.format("%Y-%m-%d %H:%M")
    )
}

fn document_lines(coordinator: &SessionCoordinator) -> Vec<String> {
    let view = coordinator.view();
    if view.documents.is_empty() {
        return vec!["no documents yet, try :upload <path>".into()];
    }
    let selected = view.selected.as_ref().map(|d| d.id.as_str());
    view.documents
        .iter()
        .map(|d| document_line(d, selected == Some(d.id.as_str())))
        .collect()
}

fn turn_lines(turn: &ConversationTurn) -> Vec<String> {
    let who = match turn.role {
        TurnRole::User => "you",
        TurnRole::Assistant => "assistant",
    };
    let mut lines = vec![format!("{who}> {}", turn.text)];
    lines.extend(
        turn.sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("    [{}] {}", i + 1, s)),
    );
    lines
}

async fn upload_with_progress(coordinator: &SessionCoordinator, path: String) -> Vec<String> {
    let mut rx = coordinator.upload_session().subscribe();
    let upload = knowledge::upload_document(coordinator, path);
    tokio::pin!(upload);

    let result = loop {
        tokio::select! {
            result = &mut upload => break result,
            Ok(()) = rx.changed() => {
                if let UploadPhase::Uploading { progress, .. } = &*rx.borrow_and_update() {
                    eprint!("\r  uploading {progress:>3}%");
                }
            }
        }
    };
    eprintln!();

    match result {
        Ok(receipt) => {
            let mut lines = vec![receipt.message];
            lines.extend(coordinator.view().turns.iter().flat_map(turn_lines));
            lines
        }
        Err(e) => vec![format!("! {e}")],
    }
}

/// Run one command and return what to print.
pub async fn execute(command: ShellCommand, coordinator: &SessionCoordinator, db: &Database) -> Vec<String> {
    let failed = |e: String| vec![format!("! {e}")];

    match command {
        ShellCommand::Docs => document_lines(coordinator),
        ShellCommand::Refresh(None) => match knowledge::refresh_documents(coordinator).await {
            Ok(_) => document_lines(coordinator),
            Err(e) => failed(e),
        },
        ShellCommand::Refresh(Some(id)) => match knowledge::refresh_document(coordinator, id.clone()).await {
            Ok(Some(doc)) => vec![document_line(&doc, false)],
            Ok(None) => vec![format!("[{id}] no longer exists")],
            Err(e) => failed(e),
        },
        ShellCommand::Upload(path) => upload_with_progress(coordinator, path).await,
        ShellCommand::Select(id) => match knowledge::select_document(coordinator, id.clone()) {
            Some(_) => chat::get_turns(coordinator).iter().flat_map(turn_lines).collect(),
            None if id.is_some() => vec!["unknown document, nothing selected".into()],
            None => vec!["nothing selected".into()],
        },
        ShellCommand::Delete(id) => match knowledge::delete_document(coordinator, id.clone()).await {
            Ok(()) => vec![format!("deleted [{id}]")],
            Err(e) => failed(e),
        },
        ShellCommand::Turns => chat::get_turns(coordinator).iter().flat_map(turn_lines).collect(),
        ShellCommand::Settings => match settings::get_settings(db) {
            Ok(map) if map.is_empty() => vec!["no saved settings".into()],
            Ok(map) => {
                let mut lines: Vec<String> = map.iter().map(|(k, v)| format!("{k} = {v}")).collect();
                lines.sort();
                lines
            }
            Err(e) => failed(e),
        },
        ShellCommand::Set(key, value) => match settings::set_setting(db, key.clone(), value) {
            Ok(()) => vec![format!("saved {key}; restart to apply")],
            Err(e) => failed(e),
        },
        ShellCommand::Unset(key) => match settings::delete_setting(db, key.clone()) {
            Ok(()) => vec![format!("removed {key}")],
            Err(e) => failed(e),
        },
        ShellCommand::Health => match settings::health(coordinator).await {
            Ok(health) => vec![format!("{}: {}", health.service, health.status)],
            Err(e) => failed(e),
        },
        ShellCommand::Help => HELP.lines().map(str::to_string).collect(),
        ShellCommand::Quit => Vec::new(),
        ShellCommand::Ask(question) => match chat::ask(coordinator, question).await {
            Ok(turn) => turn_lines(&turn),
            Err(e) => failed(e),
        },
    }
}

fn print(lines: &[String]) {
    let mut out = std::io::stdout().lock();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    let _ = write!(out, "> ");
    let _ = out.flush();
}

pub async fn run(coordinator: &SessionCoordinator, db: &Database) -> Result<(), AppError> {
    print(&execute(ShellCommand::Refresh(None), coordinator, db).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Ok(Some(ShellCommand::Quit)) => break,
            Ok(Some(command)) => print(&execute(command, coordinator, db).await),
            Ok(None) => print(&[]),
            Err(usage) => print(&[format!("! {usage}")]),
        }
    }
    Ok(())
}
