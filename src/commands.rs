//! Command execution.

use crate::{Commands, RecordArgs, UpdateArgs};
use chardb_client::Client;
use chardb_protocol::CharacterRecord;
use colored::Colorize;
use std::path::Path;

/// Bytes of image data shown in text output.
const IMAGE_PREVIEW_LEN: usize = 8;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => Err("the REPL cannot be started from inside a command".into()),

        Commands::List => {
            let records = match client.list().await {
                Ok(records) => records,
                // The server reports an empty database as a failure
                Err(e) if e.is_empty_result_set() => Vec::new(),
                Err(e) => return Err(e.into()),
            };

            if json {
                return Ok(serde_json::to_string_pretty(&records)?);
            }
            if records.is_empty() {
                return Ok("No records".yellow().to_string());
            }
            Ok(format_records(&records))
        }

        Commands::Get { id } => {
            let record = client.get(id).await?;
            if json {
                Ok(serde_json::to_string_pretty(&record)?)
            } else {
                Ok(format_record(&record))
            }
        }

        Commands::Add(args) => {
            let record = new_record(args)?;
            let label = format!("{} {}", record.name, record.surname);
            client.add(record).await?;
            Ok(format!("{} record {}", "Created".green(), label.cyan()))
        }

        Commands::Update { id, changes } => {
            let current = client.get(id).await?;
            let record = apply_changes(current, changes)?;
            client.update(record).await?;
            Ok(format!("{} record {}", "Updated".green(), id.to_string().cyan()))
        }

        Commands::Remove { id } => {
            client.remove(id).await?;
            Ok(format!("{} record {}", "Removed".green(), id.to_string().cyan()))
        }
    }
}

/// Builds an unassigned record from command arguments.
pub fn new_record(args: RecordArgs) -> Result<CharacterRecord, std::io::Error> {
    let mut record = CharacterRecord::new(args.name, args.surname, args.age).with_bio(args.bio);
    if let Some(path) = args.image {
        record.image = read_image(&path)?;
    }
    Ok(record)
}

/// Applies the set fields of `changes` to `record`.
pub fn apply_changes(
    mut record: CharacterRecord,
    changes: UpdateArgs,
) -> Result<CharacterRecord, std::io::Error> {
    if let Some(name) = changes.name {
        record.name = name;
    }
    if let Some(surname) = changes.surname {
        record.surname = surname;
    }
    if let Some(age) = changes.age {
        record.age = age;
    }
    if let Some(bio) = changes.bio {
        record.bio = bio;
    }
    if let Some(path) = changes.image {
        record.image = read_image(&path)?;
    }
    Ok(record)
}

fn read_image(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    std::fs::read(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("failed to read image '{}': {}", path.display(), e),
        )
    })
}

/// Formats a record as a multi-line block.
pub fn format_record(record: &CharacterRecord) -> String {
    let mut output = format!(
        "{}\n  Name: {} {}\n  Age: {}\n  Bio: {}",
        format!("Record {}", record.id.to_string().cyan()).bold(),
        record.name,
        record.surname,
        record.age,
        record.bio
    );
    if !record.image.is_empty() {
        output.push_str(&format!("\n  Image: {}", image_summary(&record.image)));
    }
    output
}

/// Formats records one per line.
pub fn format_records(records: &[CharacterRecord]) -> String {
    let mut output = String::new();
    for record in records {
        output.push_str(&format!(
            "  {:>6}  {} {} ({})",
            record.id.to_string().cyan(),
            record.name,
            record.surname,
            record.age
        ));
        if !record.image.is_empty() {
            output.push_str(&format!(" {}", "[image]".dimmed()));
        }
        output.push('\n');
    }
    output
}

fn image_summary(image: &[u8]) -> String {
    let preview = &image[..image.len().min(IMAGE_PREVIEW_LEN)];
    let ellipsis = if image.len() > IMAGE_PREVIEW_LEN { "..." } else { "" };
    format!("{} bytes ({}{})", image.len(), hex::encode(preview), ellipsis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bob() -> CharacterRecord {
        CharacterRecord::new("Bob", "Ray", 41).with_id(2).with_bio("retired")
    }

    #[test]
    fn test_new_record_with_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();

        let record = new_record(RecordArgs {
            name: "Ann".to_string(),
            surname: "Lee".to_string(),
            age: 30,
            bio: "no bio yet".to_string(),
            image: Some(file.path().to_path_buf()),
        })
        .unwrap();

        assert!(!record.is_assigned());
        assert_eq!(record.image, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(record.bio, "no bio yet");
    }

    #[test]
    fn test_new_record_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_record(RecordArgs {
            name: "Ann".to_string(),
            surname: "Lee".to_string(),
            age: 30,
            bio: String::new(),
            image: Some(dir.path().join("nope.png")),
        })
        .unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn test_apply_changes_keeps_unset_fields() {
        let updated = apply_changes(
            bob(),
            UpdateArgs {
                age: Some(42),
                ..UpdateArgs::default()
            },
        )
        .unwrap();

        assert_eq!(updated.id, 2);
        assert_eq!(updated.age, 42);
        assert_eq!(updated.name, "Bob");
        assert_eq!(updated.bio, "retired");
    }

    #[test]
    fn test_format_record() {
        colored::control::set_override(false);
        let output = format_record(&bob().with_image(vec![0xAB; 10]));
        assert!(output.starts_with("Record 2"));
        assert!(output.contains("Name: Bob Ray"));
        assert!(output.contains("Bio: retired"));
        assert!(output.contains("Image: 10 bytes (abababababababab...)"));
    }

    #[test]
    fn test_format_records() {
        colored::control::set_override(false);
        let output = format_records(&[bob(), bob().with_id(3).with_image(vec![1])]);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Bob Ray (41)"));
        assert!(!lines[0].contains("[image]"));
        assert!(lines[1].contains("[image]"));
    }

    #[test]
    fn test_image_summary_short() {
        assert_eq!(image_summary(&[0x01, 0x02]), "2 bytes (0102)");
    }
}
