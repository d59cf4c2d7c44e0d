use std::cmp;
use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use dosegloss::feedback::{FeedbackCategory, FeedbackRecord, FeedbackStore};
use dosegloss::presenter::{ModalContent, ModalPresenter, Surface};
use dosegloss::workflow::{
    AdminGate, ClearOutcome, Confirmation, FeedbackContext, FeedbackController, FeedbackDraft,
};
use dosegloss::{GlossaryEntry, GlossaryIndex, TERM_CATEGORIES};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

/// Shared admin password for bulk export/clear. Plaintext by design; this
/// gate is not a security boundary and must not be treated as one.
const ADMIN_PASSWORD: &str = "dosimetry-admin";

#[derive(Parser, Debug)]
#[command(name = "dosegloss", about = "Dosimetry glossary and feedback companion", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Feedback store file (defaults to the platform data directory).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up and search glossary terms.
    #[command(subcommand)]
    Term(TermCommand),
    /// Save, send, and manage section feedback.
    #[command(subcommand)]
    Feedback(FeedbackCommand),
}

#[derive(Subcommand, Debug)]
enum TermCommand {
    /// Show the full entry for a term key.
    Show {
        /// Term key, e.g. "committed-effective-dose".
        key: String,
    },
    /// Search terms and definitions for a keyword.
    Search {
        keyword: String,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List every term in a category.
    Category {
        /// One of the declared categories.
        name: String,
    },
    /// List every term key.
    List,
}

#[derive(Subcommand, Debug)]
enum FeedbackCommand {
    /// Save feedback locally for later sending.
    Add {
        #[arg(long)]
        section: String,
        #[arg(long)]
        module: String,
        #[arg(long)]
        category: FeedbackCategory,
        #[arg(long)]
        message: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Compose a mail message for one entry without saving it.
    Send {
        #[arg(long)]
        section: String,
        #[arg(long)]
        module: String,
        #[arg(long)]
        category: FeedbackCategory,
        #[arg(long)]
        message: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Compose one mail message carrying every saved entry.
    SendAll,
    /// List saved feedback.
    List,
    /// Write a date-stamped export file (admin).
    Export {
        /// Directory to write the export into.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        password: String,
    },
    /// Delete every saved entry (admin, irreversible).
    Clear {
        #[arg(long)]
        password: String,
        /// Required confirmation; without it nothing is deleted.
        #[arg(long)]
        yes: bool,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Command::Term(TermCommand::Show { key }) => handle_show(&key, cli.json),
        Command::Term(TermCommand::Search { keyword, limit }) => {
            handle_search(&keyword, limit, cli.json)
        }
        Command::Term(TermCommand::Category { name }) => handle_category(&name, cli.json),
        Command::Term(TermCommand::List) => handle_list(cli.json),
        Command::Feedback(command) => handle_feedback(command, cli.store, cli.json),
    }
}

fn handle_show(key: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        return match GlossaryIndex::get(key) {
            Some(entry) => {
                println!("{}", serde_json::to_string_pretty(&entry_payload(key, entry))?);
                Ok(())
            }
            None => Err(format!("No glossary entry found for {key:?}").into()),
        };
    }

    let mut modal = ModalPresenter::new(TerminalSurface);
    if !modal.open_term(key) {
        let suggestions = GlossaryIndex::search(key);
        if !suggestions.is_empty() {
            println!("Closest matches:");
            for (candidate, entry) in suggestions.iter().take(5) {
                println!("  {candidate}  ({})", entry.term);
            }
        }
    }
    Ok(())
}

fn handle_search(keyword: &str, limit: usize, as_json: bool) -> Result<(), Box<dyn Error>> {
    if keyword.trim().is_empty() {
        return Err("Search keyword cannot be empty".into());
    }
    let limit = cmp::max(1, limit);
    let mut matches = GlossaryIndex::search(keyword);
    matches.truncate(limit);

    if as_json {
        let payload = json!({
            "keyword": keyword,
            "limit": limit,
            "results": matches.iter().map(|(key, entry)| {
                json!({"key": key, "term": entry.term, "category": entry.category})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_term_table(&format!("Matches for \"{keyword}\":"), &matches);
    }
    Ok(())
}

fn handle_category(name: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let matches = GlossaryIndex::by_category(name);
    if as_json {
        let payload = json!({
            "category": name,
            "results": matches.iter().map(|(key, entry)| {
                json!({"key": key, "term": entry.term})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if matches.is_empty() {
        println!("No terms in category \"{name}\".");
        println!("Declared categories: {}", TERM_CATEGORIES.join(", "));
    } else {
        print_term_table(&format!("Terms in \"{name}\":"), &matches);
    }
    Ok(())
}

fn handle_list(as_json: bool) -> Result<(), Box<dyn Error>> {
    let all: Vec<_> = GlossaryIndex::entries().collect();
    if as_json {
        let payload: Vec<_> = all
            .iter()
            .map(|(key, entry)| json!({"key": key, "term": entry.term, "category": entry.category}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_term_table(&format!("{} glossary terms:", all.len()), &all);
    }
    Ok(())
}

fn handle_feedback(
    command: FeedbackCommand,
    store_path: Option<PathBuf>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(store_path)?;
    let mut controller =
        FeedbackController::new(store.clone(), ModalPresenter::new(TerminalSurface));
    let gate = AdminGate::new(ADMIN_PASSWORD);

    match command {
        FeedbackCommand::Add {
            section,
            module,
            category,
            message,
            email,
        } => {
            controller.open_form(FeedbackContext::new(section, module));
            let saved = controller.save_for_later(&FeedbackDraft {
                category: Some(category),
                message,
                user_email: email,
            })?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&saved.record)?);
            }
            Ok(())
        }
        FeedbackCommand::Send {
            section,
            module,
            category,
            message,
            email,
        } => {
            controller.open_form(FeedbackContext::new(section, module));
            let mail = controller.send_now(&FeedbackDraft {
                category: Some(category),
                message,
                user_email: email,
            })?;
            print_mail(&mail.to, &mail.subject, &mail.body, &mail.mailto_url(), as_json)
        }
        FeedbackCommand::SendAll => {
            let mail = controller.send_all()?;
            print_mail(&mail.to, &mail.subject, &mail.body, &mail.mailto_url(), as_json)
        }
        FeedbackCommand::List => {
            let records = store.records();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_record_table(&records);
            }
            Ok(())
        }
        FeedbackCommand::Export { dir, password } => {
            check_gate(&gate, &password)?;
            let path = store.write_export(&dir)?;
            if as_json {
                println!("{}", json!({ "written": path }));
            } else {
                println!("Export written to {}", path.display());
            }
            Ok(())
        }
        FeedbackCommand::Clear { password, yes } => {
            check_gate(&gate, &password)?;
            let confirmation = if yes {
                Confirmation::Confirmed
            } else {
                Confirmation::Cancelled
            };
            match controller.clear_saved(confirmation)? {
                ClearOutcome::Cleared { .. } => Ok(()),
                ClearOutcome::Cancelled => {
                    println!("Nothing deleted. Pass --yes to confirm clearing all saved feedback.");
                    Ok(())
                }
            }
        }
    }
}

fn check_gate(gate: &AdminGate, password: &str) -> Result<(), Box<dyn Error>> {
    if gate.check(password) {
        Ok(())
    } else {
        Err("Admin password incorrect".into())
    }
}

fn open_store(path: Option<PathBuf>) -> Result<FeedbackStore, Box<dyn Error>> {
    let path = match path {
        Some(path) => path,
        None => default_store_path()?,
    };
    Ok(FeedbackStore::persistent(path))
}

fn default_store_path() -> Result<PathBuf, Box<dyn Error>> {
    let dirs = directories::ProjectDirs::from("", "", "dosegloss")
        .ok_or("Failed to determine application data directory")?;
    Ok(dirs.data_dir().join("feedback.json"))
}

fn entry_payload(key: &str, entry: &GlossaryEntry) -> serde_json::Value {
    json!({
        "key": key,
        "term": entry.term,
        "category": entry.category,
        "definition": entry.definition,
        "related_terms": entry.related_terms,
        "references": entry.references,
    })
}

fn print_mail(
    to: &str,
    subject: &str,
    body: &str,
    mailto: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({
            "to": to,
            "subject": subject,
            "body": body,
            "mailto": mailto,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("To: {to}");
        println!("Subject: {subject}");
        println!("\n{body}");
        println!("Open in your mail client:\n{mailto}");
    }
    Ok(())
}

fn print_term_table(heading: &str, rows: &[(&str, &GlossaryEntry)]) {
    if rows.is_empty() {
        println!("No matching terms.");
        return;
    }
    let width = rows
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(3)
        .max("KEY".len());
    println!("{heading}");
    println!("{:<width$}  {:<24}  {}", "KEY", "CATEGORY", "TERM", width = width);
    println!("{:-<width$}  {:-<24}  {}", "", "", "----", width = width);
    for (key, entry) in rows {
        println!(
            "{:<width$}  {:<24}  {}",
            key,
            entry.category,
            entry.term,
            width = width
        );
    }
}

fn print_record_table(records: &[FeedbackRecord]) {
    if records.is_empty() {
        println!("No saved feedback.");
        return;
    }
    println!("{} saved record(s):", records.len());
    for (n, record) in records.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} / {} — {}",
            n + 1,
            record.category.label(),
            record.module,
            record.section,
            record.message
        );
        println!("     {} ({})", record.timestamp, record.id);
    }
}

/// Terminal rendering of the modal: a framed block with the body run through
/// termimad when stdout is a tty.
struct TerminalSurface;

impl Surface for TerminalSurface {
    fn render(&mut self, content: &ModalContent) {
        println!("{} [{}]", content.title, content.category);
        println!("{}", "=".repeat(content.title.len().max(8)));
        render_markdown_block(&content.body);
        if !content.related.is_empty() {
            let chips: Vec<String> = content
                .related
                .iter()
                .map(|chip| format!("{} ({})", chip.term, chip.key))
                .collect();
            println!("\nRelated: {}", chips.join(", "));
        }
        if let Some(reference) = &content.reference {
            println!("\nReference: {reference}");
        }
    }

    fn clear_modal(&mut self) {}

    fn set_scroll_lock(&mut self, _locked: bool) {}

    fn notice(&mut self, text: &str) {
        println!("{text}");
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
