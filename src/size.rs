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

use crate::error::*;

use std::path::Path;

use walkdir::WalkDir;

// Used for Deb's Installed-Size field, which is measured in KiB
// https://www.debian.org/doc/debian-policy/ch-controlfields.html#installed-size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeRounding {
    /// Round to the nearest KiB, halves rounding up.
    #[default]
    Nearest,
    /// Round any partial KiB up, the way dpkg-gencontrol does.
    Ceiling,
}

impl SizeRounding {
    // Converts a byte count to KiB
    pub fn to_kb(&self, bytes: u64) -> u64 {
        match self {
            SizeRounding::Nearest => (bytes + 512) / 1024,
            SizeRounding::Ceiling => (bytes + 1023) / 1024,
        }
    }
}

/// Sums the length of every regular file under `dir`, in bytes.
///
/// Directories and symlinks contribute nothing, and symlinks are not followed.
pub fn folder_size_bytes<P: AsRef<Path>>(dir: P) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Returns the installed size of `dir` in KiB, rounded to the nearest integer.
pub fn folder_size_kb<P: AsRef<Path>>(dir: P) -> Result<u64> {
    folder_size_kb_with(dir, SizeRounding::Nearest)
}

/// Returns the installed size of `dir` in KiB using `rounding`.
pub fn folder_size_kb_with<P: AsRef<Path>>(dir: P, rounding: SizeRounding) -> Result<u64> {
    Ok(rounding.to_kb(folder_size_bytes(dir)?))
}
