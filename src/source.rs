//! Source buffer: the non-blank logical lines of one module.

use std::path::{Path, PathBuf};

use crate::error::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based physical line number in the file.
    pub number: usize,
    /// Count of leading whitespace characters.
    pub indent: usize,
    /// Line content with the comment removed and surrounding whitespace trimmed.
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SourceBuffer {
    file: PathBuf,
    lines: Vec<SourceLine>,
}

impl SourceBuffer {
    pub fn new(source: &str, file: PathBuf) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .filter_map(|(index, raw)| {
                let code = strip_comment(raw);
                let text = code.trim();
                if text.is_empty() {
                    return None;
                }
                let indent = code.chars().take_while(|c| c.is_whitespace()).count();
                Some(SourceLine {
                    number: index + 1,
                    indent,
                    text: text.to_string(),
                })
            })
            .collect();
        Self { file, lines }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Returns the line at `index`, or `None` once past the end of the source.
    pub fn get(&self, index: usize) -> Option<&SourceLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SourceLine)> {
        self.lines.iter().enumerate()
    }

    pub fn location(&self, index: usize) -> Location {
        match self.lines.get(index) {
            Some(line) => Location::new(self.file.clone(), line.number, line.text.clone()),
            None => Location::new(self.file.clone(), 0, "<end of file>"),
        }
    }
}

/// Cuts the line at the first `#` that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (index, ch) in line.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '#' => return &line[..index],
            None => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_dropped() {
        let source = "x = 1\n\n   # just a comment\n    y = 2 # trailing\n";
        let buffer = SourceBuffer::new(source, PathBuf::from("main.ipl"));
        assert_eq!(buffer.len(), 2);

        let first = buffer.get(0).expect("first line");
        assert_eq!(first.number, 1);
        assert_eq!(first.indent, 0);
        assert_eq!(first.text, "x = 1");

        let second = buffer.get(1).expect("second line");
        assert_eq!(second.number, 4);
        assert_eq!(second.indent, 4);
        assert_eq!(second.text, "y = 2");

        assert!(buffer.get(2).is_none());
    }

    #[test]
    fn hash_inside_string_is_kept() {
        let buffer = SourceBuffer::new("out(\"#1\") # note", PathBuf::from("main.ipl"));
        assert_eq!(buffer.get(0).map(|l| l.text.as_str()), Some("out(\"#1\")"));
    }

    #[test]
    fn location_reports_physical_line() {
        let buffer = SourceBuffer::new("\n\nz = 3", PathBuf::from("dir/prog.ipl"));
        let location = buffer.location(0);
        assert_eq!(location.line, 3);
        assert_eq!(location.text, "z = 3");
        assert_eq!(location.file, PathBuf::from("dir/prog.ipl"));
    }
}
