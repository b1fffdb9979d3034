mod compose;
mod config;
mod decode;
mod error;
mod mailbox;
mod message;
mod submit;

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use crate::config::Config;
use crate::mailbox::MailboxSession;
use crate::message::FetchedMessage;
use crate::submit::SubmissionSession;

/// How many messages one listing page shows, newest first.
const PAGE_SIZE: usize = 20;

/// Terminal mail client with IMAP browsing and SMTP sending
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "config.json")]
    config: String,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let config_path = shellexpand::tilde(&args.config).into_owned();
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    println!("Connecting to IMAP/SMTP...");
    let mut mailbox = MailboxSession::new(&config.imap, &config.auth, config.timeout());
    mailbox
        .connect()
        .context("Failed to connect to the mailbox server")?;
    let mut submission = SubmissionSession::new(&config.smtp, &config.auth, config.timeout());
    submission
        .connect()
        .context("Failed to connect to the submission server")?;
    println!("Connected. Logged in as: {}", config.auth.user);

    match mailbox.list_folders() {
        Ok(folders) => {
            println!("\nAvailable folders:");
            for folder in folders {
                println!(" - {}", folder);
            }
        }
        Err(e) => warn!("could not list folders: {}", e),
    }

    main_menu(&config, &mut mailbox, &mut submission);

    println!("Disconnecting...");
    submission.close();
    if let Some(e) = mailbox.close() {
        warn!("mailbox sign-off failed: {}", e);
    }
    Ok(())
}

fn main_menu(config: &Config, mailbox: &mut MailboxSession, submission: &mut SubmissionSession) {
    loop {
        println!("\n=== MENU ===");
        println!("1) Browse inbox");
        println!("2) Browse sent mail");
        println!("3) Browse trash");
        println!("4) Browse spam");
        println!("5) Send a new email");
        println!("0) Quit");

        let result = match prompt("Choice: ").as_str() {
            "1" => browse_folder(config, mailbox, submission, &config.folders.inbox),
            "2" => browse_folder(config, mailbox, submission, &config.folders.sent),
            "3" => browse_folder(config, mailbox, submission, &config.folders.trash),
            "4" => browse_folder(config, mailbox, submission, &config.folders.spam),
            "5" => compose_and_send(config, mailbox, submission),
            "0" => return,
            _ => {
                println!("Invalid choice.");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("[error] {:#}", e);
        }
    }
}

fn browse_folder(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
    folder: &str,
) -> Result<()> {
    println!("\n>>> Folder: {}", folder);
    mailbox.select_folder(folder)?;
    let mut uids = mailbox.search_all()?;
    if uids.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    // Server order is oldest first; show the newest page.
    uids.reverse();
    uids.truncate(PAGE_SIZE);

    for (index, uid) in uids.iter().enumerate() {
        let summary = mailbox.fetch_summary(*uid)?;
        println!(
            "{}) {} | {} | {}",
            index + 1,
            summary.date,
            summary.from,
            summary.subject
        );
    }

    let choice = prompt("Message number = open, Enter = back: ");
    if let Ok(selection) = choice.parse::<usize>() {
        if (1..=uids.len()).contains(&selection) {
            open_message(config, mailbox, submission, uids[selection - 1])?;
        }
    }
    Ok(())
}

fn open_message(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
    uid: u32,
) -> Result<()> {
    let message = mailbox.fetch_full(uid)?;

    println!("\n==================== MESSAGE ====================");
    println!("From:    {}", message.from_line());
    println!("To:      {}", message.to_line());
    println!("Subject: {}", message.subject);
    println!("Date:    {}", message.date);
    println!("-------------------------------------------------");
    println!("{}", decode::extract_plain_text(&message));
    println!("=================================================\n");

    loop {
        match prompt("[r]eply | [f]orward | [b]ack: ").to_lowercase().as_str() {
            "r" => return send_reply(config, mailbox, submission, &message),
            "f" => return send_forward(config, mailbox, submission, &message),
            "b" => return Ok(()),
            _ => {}
        }
    }
}

fn compose_and_send(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
) -> Result<()> {
    let to = prompt_addresses("To (comma separated): ");
    let subject = prompt("Subject: ");
    let body = read_body();
    let message = compose::new_message(&config.auth.user, to, &subject, &body);
    deliver(config, mailbox, submission, &message)
}

fn send_reply(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
    original: &FetchedMessage,
) -> Result<()> {
    let message = compose::reply(original, &config.auth.user, &read_body());
    println!("Replying to: {}", message.to.join(", "));
    deliver(config, mailbox, submission, &message)
}

fn send_forward(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
    original: &FetchedMessage,
) -> Result<()> {
    let to = prompt_addresses("Forward to (comma separated): ");
    let message = compose::forward(original, &config.auth.user, to, &read_body());
    deliver(config, mailbox, submission, &message)
}

fn deliver(
    config: &Config,
    mailbox: &mut MailboxSession,
    submission: &mut SubmissionSession,
    message: &crate::message::OutgoingMessage,
) -> Result<()> {
    let warning = submission.send(message, Some((mailbox, config.folders.sent.as_str())))?;
    println!("Message sent.");
    if let Some(warning) = warning {
        println!("[warning] {}", warning);
    }
    Ok(())
}

fn prompt(text: &str) -> String {
    print!("{}", text);
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

/// Keeps asking until at least one recipient address comes back; the
/// composer and the submission layer both assume a non-empty list.
fn prompt_addresses(text: &str) -> Vec<String> {
    loop {
        let addresses = split_addresses(&prompt(text));
        if !addresses.is_empty() {
            return addresses;
        }
        println!("Please enter at least one address.");
    }
}

/// Reads body lines until a line containing only ".".
fn read_body() -> String {
    println!("Message text (finish with a single '.' on its own line):");
    let mut lines = Vec::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.unwrap_or_default();
        if line.trim() == "." {
            break;
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn split_addresses(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
