/*
    deb-assemble - Rust library for assembling Deb packages
    Copyright (C) 2023  NotSludgeBomb

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Line-preserving edits of a package's `control` file.
//!
//! Unlike a full deb822 parser, [`ControlDocument`] only understands single
//! `Key: Value` lines. Everything else (continuation lines, comments, blank
//! lines) is carried through untouched, so a hand-written control file comes
//! back out looking the way it went in, apart from line endings.

use crate::error::*;

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

// Matches any line terminator: `\r\n`, a lone `\r` or `\n`
fn terminator_regex() -> &'static Regex {
    static TERMINATOR: OnceLock<Regex> = OnceLock::new();
    TERMINATOR.get_or_init(|| Regex::new(r"\r\n|\r|\n").unwrap())
}

// Matches a `Key: Value` field line, capturing the key and the raw value
fn field_regex() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| Regex::new(r"^([!-9;-~][!-9;-~]*):(.*)$").unwrap())
}

/// An ordered sequence of control file lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlDocument {
    lines: Vec<String>,
}

impl ControlDocument {
    /// Splits `text` into lines, accepting `\n`, `\r\n` and lone `\r` terminators.
    ///
    /// A leading byte order mark is dropped.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines: Vec<String> = terminator_regex()
            .split(text)
            .map(str::to_string)
            .collect();
        // A terminated last line leaves an empty string behind
        if lines.last().map_or(false, |line| line.is_empty()) {
            lines.pop();
        }
        Self { lines }
    }

    /// Parses a control file from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Ok(Self::parse(&String::from_utf8(bytes)?))
    }

    /// Reads the control file at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_bytes(fs::read(path).map_err(DebError::io_path(path))?)
    }

    /// Returns the trimmed value of the first line starting with `key:`.
    ///
    /// Returns an empty string when no line matches.
    pub fn property(&self, key: &str) -> &str {
        self.lines
            .iter()
            .find_map(|line| value_of(line, key))
            .map(str::trim)
            .unwrap_or("")
    }

    /// Like [`property`](Self::property), but an absent or empty value is an error.
    pub fn required_property(&self, key: &str) -> Result<&str> {
        match self.property(key) {
            "" => Err(DebError::MissingControlProperty(key.to_string())),
            value => Ok(value),
        }
    }

    /// Rewrites every line starting with `key:` to `key: value`.
    ///
    /// Note that this touches all matching lines while [`property`](Self::property)
    /// only ever looks at the first one. When no line matches, the field is
    /// inserted after the last non-blank line so it stays in the same paragraph.
    /// Returns how many existing lines were rewritten.
    ///
    /// # Errors
    ///
    /// A value containing a line terminator would smuggle extra lines into
    /// the file, so it is rejected and the document is left untouched.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<usize> {
        if value.contains(['\n', '\r']) {
            return Err(DebError::InvalidPropertyValue(key.to_string(), value.to_string()));
        }
        let field = format!("{}: {}", key, value);
        let mut rewritten = 0;
        for line in self.lines.iter_mut() {
            if value_of(line, key).is_some() {
                *line = field.clone();
                rewritten += 1;
            }
        }
        if rewritten == 0 {
            let at = self
                .lines
                .iter()
                .rposition(|line| !line.trim().is_empty())
                .map_or(0, |index| index + 1);
            self.lines.insert(at, field);
        }
        Ok(rewritten)
    }

    /// Iterates over the `(key, value)` pairs of every field line, in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| {
            let caps = field_regex().captures(line)?;
            Some((caps.get(1)?.as_str(), caps.get(2)?.as_str().trim()))
        })
    }

    /// Returns the document's lines.
    pub fn lines(&self) -> &Vec<String> {
        &self.lines
    }

    /// Converts the document back into file contents, one linefeed per line.
    pub fn serialize(&self) -> Vec<u8> {
        let mut write_out = String::new();
        for line in &self.lines {
            write_out.push_str(line);
            write_out.push('\n');
        }
        write_out.into_bytes()
    }

    /// Writes the document to `path`, replacing whatever is there.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.serialize()).map_err(DebError::io_path(path))
    }
}

// Returns the text after `key:` if `line` begins with it
fn value_of<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key)?.strip_prefix(':')
}
