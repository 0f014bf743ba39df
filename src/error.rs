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

use std::path::PathBuf;

use thiserror::Error;

/// Every way assembling or reading a package can fail.
#[derive(Debug, Error)]
pub enum DebError {
    #[error("required control property missing or empty: {0}")]
    MissingControlProperty(String),

    #[error("value for control property {0} spans several lines: {1:?}")]
    InvalidPropertyValue(String, String),

    #[error("failed to resolve package version: {0}")]
    VersionResolution(#[source] std::io::Error),

    #[error("compressing {} into {} failed: {}", .src.display(), .dest.display(), .source)]
    Compression {
        src: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error on path {}: {}", .0.display(), .1)]
    IoPath(PathBuf, #[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("control file is not valid UTF-8: {0}")]
    ControlEncoding(#[from] std::string::FromUtf8Error),

    #[error("invalid archive member name {0:?}: expected 1 to 16 printable characters")]
    InvalidMemberName(String),

    #[error("archive member {0} field {1} does not fit its header width")]
    HeaderFieldOverflow(String, &'static str),

    #[error("malformed deb archive: {0}")]
    MalformedArchive(String),
}

impl DebError {
    // Attaches `path` to an I/O error
    pub(crate) fn io_path<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |e| DebError::IoPath(path, e)
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, DebError>;
