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

//! Encoding of Unix `ar` archive members.
//!
//! A `.deb` is an `ar` archive, and every member starts with a 60 byte ASCII
//! header:
//!
//! | Field      | Width | Value                       |
//! |------------|-------|-----------------------------|
//! | name       | 16    | member name                 |
//! | mtime      | 12    | Unix seconds, decimal       |
//! | owner id   | 6     | `0`                         |
//! | group id   | 6     | `0`                         |
//! | mode       | 8     | `100644`                    |
//! | size       | 10    | content length, decimal     |
//! | terminator | 2     | `` ` `` followed by `\n`    |
//!
//! Every field is left-justified and padded with spaces. Members are aligned
//! to even offsets, so odd-length content is followed by a single `\n` that
//! the size field doesn't count.

use crate::error::*;

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// The 8 byte global header every `ar` archive starts with.
pub const AR_MAGIC: &[u8; 8] = b"!<arch>\n";

/// Length of a member header, terminator included.
pub const HEADER_LEN: usize = 60;

/// Longest member name that fits the header's name field.
pub const MAX_NAME_LEN: usize = 16;

// dpkg writes every member as a regular rw-r--r-- file
const FILE_MODE: u32 = 0o100644;
const HEADER_TERMINATOR: &[u8; 2] = b"`\n";
const PAD_BYTE: u8 = b'\n';
// Largest values the 12 digit mtime and 10 digit size fields can hold
const MAX_MTIME: u64 = 999_999_999_999;
const MAX_SIZE: u64 = 9_999_999_999;

/// One named blob inside an `ar` archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    name: String,
    mtime: u64,
    content: Vec<u8>,
}

impl ArchiveMember {
    /// Creates a member from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Names are never truncated, so anything longer than 16 characters,
    /// empty, or containing whitespace, `/` or non-printable characters
    /// is rejected. An mtime or content length too large for its header
    /// field is rejected as well.
    pub fn new(name: &str, mtime: u64, content: Vec<u8>) -> Result<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && name.bytes().all(|byte| byte.is_ascii_graphic() && byte != b'/');
        if !valid {
            return Err(DebError::InvalidMemberName(name.to_string()));
        }
        check_width(name, "mtime", mtime, MAX_MTIME)?;
        check_width(name, "size", content.len() as u64, MAX_SIZE)?;
        Ok(Self {
            name: name.to_string(),
            mtime,
            content,
        })
    }

    /// Creates a member from the file at `path`, named after the file.
    ///
    /// The member's mtime is the file's modification time unless `mtime` is given.
    pub fn from_path<P: AsRef<Path>>(path: P, mtime: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(DebError::InvalidMemberName(path.display().to_string())),
        };
        let content = fs::read(path).map_err(DebError::io_path(path))?;
        let mtime = match mtime {
            Some(mtime) => mtime,
            None => {
                let modified = fs::metadata(path)
                    .and_then(|meta| meta.modified())
                    .map_err(DebError::io_path(path))?;
                unix_seconds(modified)
            }
        };
        Self::new(&name, mtime, content)
    }

    /// Builds the 60 byte header for this member.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let fields = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8o}{:<10}",
            self.name,
            self.mtime,
            0,
            0,
            FILE_MODE,
            self.content.len(),
        );
        // Every field was width-checked on construction
        let mut header = [b' '; HEADER_LEN];
        header[..HEADER_LEN - HEADER_TERMINATOR.len()].copy_from_slice(fields.as_bytes());
        header[HEADER_LEN - HEADER_TERMINATOR.len()..].copy_from_slice(HEADER_TERMINATOR);
        header
    }

    /// Encodes the header, the content and the pad byte if one is needed.
    pub fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.encoded_len());
        output.extend_from_slice(&self.header());
        output.extend_from_slice(&self.content);
        if (HEADER_LEN + self.content.len()) % 2 == 1 {
            output.push(PAD_BYTE);
        }
        output
    }

    /// Returns how many bytes [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        let len = HEADER_LEN + self.content.len();
        len + len % 2
    }

    /// Returns the member's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the member's modification time in Unix seconds.
    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Returns the member's unpadded size.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns the member's contents.
    pub fn content(&self) -> &Vec<u8> {
        &self.content
    }
}

/// Lays out a complete archive: the magic, then each member in the given order.
pub fn package_bytes(members: &[ArchiveMember]) -> Vec<u8> {
    let len = AR_MAGIC.len() + members.iter().map(ArchiveMember::encoded_len).sum::<usize>();
    let mut output = Vec::with_capacity(len);
    output.extend_from_slice(AR_MAGIC);
    for member in members {
        output.extend_from_slice(&member.encode());
    }
    output
}

fn check_width(name: &str, field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(DebError::HeaderFieldOverflow(name.to_string(), field));
    }
    Ok(())
}

// Converts a SystemTime to Unix seconds, clamping times before the epoch to 0
pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    DateTime::<Utc>::from(time).timestamp().max(0) as u64
}
