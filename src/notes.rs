//! Speaker notes extraction.
//!
//! Notes are read from the slide sources, not from the presentation file.
//! An index file lists the slide decks in order; every deck is split into
//! slides and each slide may carry a `Notes :` section. Pages are numbered
//! continuously across decks, one page per slide.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{NotesError, Result};
use crate::platform::Note;

/// Four line breaks separate two slides.
#[allow(clippy::expect_used)]
static SLIDE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n\r?\n\r?\n\r?\n").expect("Invalid slide separator regex"));

/// Marker line opening the notes of a slide.
#[allow(clippy::expect_used)]
static NOTES_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\nNotes : *\r?\n").expect("Invalid notes marker regex"));

/// Parser for slide-deck speaker notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotesParser;

impl NotesParser {
    /// Parses the notes of every deck listed in an index file.
    ///
    /// Deck paths are relative to the index directory.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::MissingSource`] if the index or a deck does not
    /// exist and [`NotesError::InvalidIndex`] if the index is not a JSON
    /// array of paths.
    pub fn parse(index: &Path) -> Result<Vec<Note>> {
        let decks = Self::read_index(index)?;
        let base = index.parent().unwrap_or_else(|| Path::new(""));

        let mut notes = Vec::new();
        let mut page: u32 = 1;

        for deck in decks {
            let deck_path = base.join(&deck);
            let text = std::fs::read_to_string(&deck_path).map_err(|_| NotesError::MissingSource {
                path: deck_path.clone(),
            })?;

            for slide in SLIDE_SEPARATOR.split(text.trim()) {
                if let Some(note) = Self::slide_note(slide) {
                    notes.push(Note {
                        page,
                        content: note.to_string(),
                    });
                }
                page += 1;
            }
            debug!("Parsed {} up to page {}", deck_path.display(), page - 1);
        }

        Ok(notes)
    }

    fn read_index(index: &Path) -> Result<Vec<PathBuf>> {
        let raw = std::fs::read_to_string(index).map_err(|_| NotesError::MissingSource {
            path: index.to_path_buf(),
        })?;

        let decks = serde_json::from_str(&raw).map_err(|e| NotesError::InvalidIndex {
            path: index.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(decks)
    }

    /// Returns the trimmed notes of a slide, `None` when absent or empty.
    fn slide_note(slide: &str) -> Option<&str> {
        let note = NOTES_MARKER.splitn(slide, 3).nth(1)?.trim();
        (!note.is_empty()).then_some(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::fs;

    fn write_index(dir: &Path, decks: &[(&str, &str)]) -> PathBuf {
        let slides = dir.join("Slides");
        fs::create_dir_all(&slides).unwrap();
        let names: Vec<&str> = decks.iter().map(|(name, _)| *name).collect();
        for (name, content) in decks {
            fs::write(slides.join(name), content).unwrap();
        }
        let index = slides.join("slides.json");
        fs::write(&index, serde_json::to_string(&names).unwrap()).unwrap();
        index
    }

    #[test]
    fn test_pages_continue_across_decks() {
        let dir = tempfile::tempdir().unwrap();
        let first = "# Title\n\nNotes :\nWelcome everyone\n\n\n\n# Why\nNotes : \n   \n\n\n\n# Agenda\n";
        let second = "# Part 2\nNotes :\nSecond deck\n\n\n\n# End\r\nNotes :\r\nThanks";
        let index = write_index(dir.path(), &[("01.md", first), ("02.md", second)]);

        let notes = NotesParser::parse(&index).unwrap();
        assert_eq!(
            notes,
            vec![
                Note { page: 1, content: String::from("Welcome everyone") },
                Note { page: 4, content: String::from("Second deck") },
                Note { page: 5, content: String::from("Thanks") },
            ]
        );
    }

    #[test]
    fn test_slides_without_notes() {
        let dir = tempfile::tempdir().unwrap();
        let index = write_index(dir.path(), &[("01.md", "# A\n\n\n\n# B\n")]);
        assert!(NotesParser::parse(&index).unwrap().is_empty());
    }

    #[test]
    fn test_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let err = NotesParser::parse(&dir.path().join("slides.json")).unwrap_err();
        assert!(matches!(err, SyncError::Notes(NotesError::MissingSource { .. })));
    }

    #[test]
    fn test_missing_deck() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("slides.json");
        fs::write(&index, r#"["missing.md"]"#).unwrap();
        let err = NotesParser::parse(&index).unwrap_err();
        match err {
            SyncError::Notes(NotesError::MissingSource { path }) => {
                assert!(path.ends_with("missing.md"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("slides.json");
        fs::write(&index, r#"{"decks": []}"#).unwrap();
        let err = NotesParser::parse(&index).unwrap_err();
        assert!(matches!(err, SyncError::Notes(NotesError::InvalidIndex { .. })));
    }
}
