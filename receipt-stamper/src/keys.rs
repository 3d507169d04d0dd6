use std::{fmt, fs, path::Path};

use crate::error::StampError;

/// Lines with at least this many words are read as mnemonic phrases.
pub const MNEMONIC_MIN_WORDS: usize = 12;

#[derive(Clone, PartialEq, Eq)]
pub enum KeyEntry {
    Mnemonic { phrase: String },
    RawKey { value: String },
}

impl KeyEntry {
    pub fn classify(line: &str) -> KeyEntry {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() >= MNEMONIC_MIN_WORDS {
            KeyEntry::Mnemonic {
                phrase: words.join(" "),
            }
        } else {
            KeyEntry::RawKey {
                value: line.trim().to_string(),
            }
        }
    }

    pub fn is_mnemonic(&self) -> bool {
        matches!(self, KeyEntry::Mnemonic { .. })
    }
}

// Never print secrets.
impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyEntry::Mnemonic { phrase } => write!(
                f,
                "Mnemonic({} words)",
                phrase.split_whitespace().count()
            ),
            KeyEntry::RawKey { .. } => write!(f, "RawKey(..)"),
        }
    }
}

/// Non-empty lines not starting with `#`, classified.
pub fn parse_key_lines(contents: &str) -> Vec<KeyEntry> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(KeyEntry::classify)
        .collect()
}

/// A directly supplied key wins over the key file, which is then not read.
pub fn load_key_entries(direct: Option<&str>, path: &Path) -> Result<Vec<KeyEntry>, StampError> {
    if let Some(value) = direct.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(vec![KeyEntry::RawKey {
            value: value.to_string(),
        }]);
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StampError::Config(format!(
            "no private key given and key file {} is unreadable: {}",
            path.display(),
            e
        ))
    })?;

    let entries = parse_key_lines(&contents);
    if entries.is_empty() {
        return Err(StampError::Config(format!(
            "key file {} has no usable lines",
            path.display()
        )));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn words(n: usize) -> String {
        vec!["abandon"; n].join(" ")
    }

    #[test]
    fn eleven_words_is_a_raw_key_twelve_is_a_mnemonic() {
        assert!(!KeyEntry::classify(&words(11)).is_mnemonic());
        assert!(KeyEntry::classify(&words(12)).is_mnemonic());
        assert!(KeyEntry::classify(&words(24)).is_mnemonic());
    }

    #[test]
    fn mnemonic_whitespace_is_normalized() {
        let entry = KeyEntry::classify("a  b\tc d e f g h i j k   l");

        assert_eq!(
            entry,
            KeyEntry::Mnemonic {
                phrase: "a b c d e f g h i j k l".to_string()
            }
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let contents = format!("# senders\n\n  deadbeef  \n#{}\n{}\n", words(12), words(12));

        let entries = parse_key_lines(&contents);

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            KeyEntry::RawKey {
                value: "deadbeef".to_string()
            }
        );
        assert!(entries[1].is_mnemonic());
    }

    #[test]
    fn direct_key_skips_the_file() {
        let entries = load_key_entries(Some(" cafe "), Path::new("/nonexistent/keys.txt")).unwrap();

        assert_eq!(
            entries,
            vec![KeyEntry::RawKey {
                value: "cafe".to_string()
            }]
        );
    }

    #[test]
    fn empty_key_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here\n\n").unwrap();

        let result = load_key_entries(None, file.path());

        assert!(matches!(result, Err(StampError::Config(_))));
    }

    #[test]
    fn missing_key_file_without_direct_key_is_a_config_error() {
        let result = load_key_entries(Some("   "), Path::new("/nonexistent/keys.txt"));

        assert!(matches!(result, Err(StampError::Config(_))));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let entry = KeyEntry::classify(&words(12));

        assert_eq!(format!("{:?}", entry), "Mnemonic(12 words)");
        assert!(!format!("{:?}", KeyEntry::classify("deadbeef")).contains("dead"));
    }
}
