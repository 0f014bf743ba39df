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

use std::fs;
use std::io::{Error, ErrorKind};
use std::path::PathBuf;

/// Supplies the upstream version written into the package's `Version` field.
pub trait VersionResolver {
    fn resolve(&self) -> std::io::Result<String>;
}

impl<F> VersionResolver for F
where
    F: Fn() -> std::io::Result<String>,
{
    fn resolve(&self) -> std::io::Result<String> {
        self()
    }
}

/// A version known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedVersion(pub String);

impl VersionResolver for FixedVersion {
    fn resolve(&self) -> std::io::Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the version from the first non-empty line of a file, such as a
/// `VERSION` file left behind by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFile(pub PathBuf);

impl VersionResolver for VersionFile {
    fn resolve(&self) -> std::io::Result<String> {
        let contents = fs::read_to_string(&self.0)?;
        match contents.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(line) => Ok(line.to_string()),
            None => Err(Error::new(
                ErrorKind::InvalidData,
                format!("{} contains no version", self.0.display()),
            )),
        }
    }
}
