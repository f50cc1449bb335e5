//! Interactive REPL.

use crate::commands;
use crate::config::Config;
use crate::{Commands, RecordArgs, UpdateArgs};
use chardb_client::Client;
use chardb_protocol::DEFAULT_BIO;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;

const HISTORY_FILE: &str = ".chardb_history";

const HELP_TEXT: &str = r#"
Available commands:
  help                                Show this help

  list                                List all records
  get <id>                            Show one record
  add <name> <surname> <age> [bio]    Create a record
  update <id> <field> <value>         Change one field (name, surname, age, bio, image)
  remove <id>                         Remove a record

  reconnect                           Reconnect after the connection dropped
  quit, exit                          Exit the REPL
"#;

/// A parsed REPL line.
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Help,
    Quit,
    Reconnect,
    Run(Commands),
}

pub async fn run(
    mut client: Client,
    config: &Config,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "chardb CLI".bold().cyan());
    println!("Connecting to {}:{}...", config.host, config.port);

    client.connect(&config.host).await?;
    println!("{}", "Connected!".green());

    let editor_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(editor_config)?;

    let history_path = history_path();
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "chardb>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let command = match parse_line(line) {
                    Ok(command) => command,
                    Err(usage) => {
                        println!("{}\n", usage);
                        continue;
                    }
                };

                match command {
                    ReplCommand::Help => println!("{}", HELP_TEXT),
                    ReplCommand::Quit => break,
                    ReplCommand::Reconnect => match client.connect(&config.host).await {
                        Ok(()) => println!("{}\n", "Connected!".green()),
                        Err(e) => println!("{}: {}\n", "Connection failed".red(), e),
                    },
                    ReplCommand::Run(cmd) => match commands::execute(&mut client, cmd, json).await {
                        Ok(output) => println!("{}\n", output),
                        Err(e) => println!("{}: {}\n", "Error".red(), e),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        tracing::debug!("Failed to save history to {}: {}", history_path.display(), e);
    }

    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

fn history_path() -> PathBuf {
    home::home_dir()
        .map(|home| home.join(HISTORY_FILE))
        .unwrap_or_else(|| PathBuf::from(HISTORY_FILE))
}

/// Parses a REPL line. On error returns the usage text to show.
fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((cmd, args)) = parts.split_first() else {
        return Err(String::new());
    };

    match cmd.to_lowercase().as_str() {
        "help" | "?" => Ok(ReplCommand::Help),

        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),

        "reconnect" | "connect" => Ok(ReplCommand::Reconnect),

        "list" | "ls" => Ok(ReplCommand::Run(Commands::List)),

        "get" => {
            let [id] = args else {
                return Err("Usage: get <id>".to_string());
            };
            Ok(ReplCommand::Run(Commands::Get { id: parse_id(id)? }))
        }

        "add" => {
            if args.len() < 3 {
                return Err("Usage: add <name> <surname> <age> [bio]".to_string());
            }
            let bio = match args[3..].join(" ") {
                bio if bio.is_empty() => DEFAULT_BIO.to_string(),
                bio => bio,
            };
            Ok(ReplCommand::Run(Commands::Add(RecordArgs {
                name: args[0].to_string(),
                surname: args[1].to_string(),
                age: parse_age(args[2])?,
                bio,
                image: None,
            })))
        }

        "update" => {
            if args.len() < 3 {
                return Err("Usage: update <id> <field> <value>".to_string());
            }
            let id = parse_id(args[0])?;
            let value = args[2..].join(" ");
            let mut changes = UpdateArgs::default();
            match args[1] {
                "name" => changes.name = Some(value),
                "surname" => changes.surname = Some(value),
                "age" => changes.age = Some(parse_age(&value)?),
                "bio" => changes.bio = Some(value),
                "image" => changes.image = Some(PathBuf::from(value)),
                other => {
                    return Err(format!(
                        "Unknown field '{}'. Fields: name, surname, age, bio, image",
                        other
                    ))
                }
            }
            Ok(ReplCommand::Run(Commands::Update { id, changes }))
        }

        "remove" | "rm" | "delete" => {
            let [id] = args else {
                return Err("Usage: remove <id>".to_string());
            };
            Ok(ReplCommand::Run(Commands::Remove { id: parse_id(id)? }))
        }

        _ => Err(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            cmd
        )),
    }
}

fn parse_id(value: &str) -> Result<i32, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid id '{}': expected an integer", value))
}

fn parse_age(value: &str) -> Result<u8, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid age '{}': expected 0-255", value))
}
