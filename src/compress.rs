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

//! Turning a directory tree into a `.tar.gz` stream.
//!
//! The assembler never compresses anything itself. It asks a [`Compressor`]
//! to do it, and any closure of the right shape is one.

use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

/// Compresses the tree at `src_dir` into a gzipped tarball at `dest_file`.
pub trait Compressor {
    fn compress(&self, src_dir: &Path, dest_file: &Path) -> std::io::Result<()>;
}

impl<F> Compressor for F
where
    F: Fn(&Path, &Path) -> std::io::Result<()>,
{
    fn compress(&self, src_dir: &Path, dest_file: &Path) -> std::io::Result<()> {
        self(src_dir, dest_file)
    }
}

/// An in-process compressor built on the `tar` and `flate2` crates.
///
/// Entries are stored relative to the tree's root, in sorted order, owned by
/// `root:root`.
#[derive(Debug, Clone, Default)]
pub struct TarGzCompressor {
    mtime: Option<u64>, // Fixed mtime for every entry, otherwise taken from the file
    level: Option<u32>, // gzip level, flate2's default when unset
}

impl TarGzCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps every entry with `mtime` instead of the file's own.
    pub fn set_mtime(mut self, mtime: Option<u64>) -> Self {
        self.mtime = mtime;
        self
    }

    /// Sets the gzip compression level, from 0 to 9.
    pub fn set_level(mut self, level: u32) -> Self {
        self.level = Some(level.min(9));
        self
    }

    fn write_tar(&self, src_dir: &Path, dest_file: &Path) -> std::io::Result<()> {
        let level = match self.level {
            Some(level) => Compression::new(level),
            None => Compression::default(),
        };
        let encoder = GzEncoder::new(fs::File::create(dest_file)?, level);
        let mut tar = tar::Builder::new(encoder);

        for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            // The tar library doesn't allow absolute paths
            let relative = path
                .strip_prefix(src_dir)
                .map_err(|e| Error::new(ErrorKind::Other, e))?;
            let metadata = entry.metadata()?;

            let mut header = tar::Header::new_gnu();
            header.set_uid(0);
            header.set_gid(0);
            header.set_username("root")?;
            header.set_groupname("root")?;
            header.set_mtime(match self.mtime {
                Some(mtime) => mtime,
                None => crate::member::unix_seconds(metadata.modified()?),
            });
            header.set_mode(file_mode(&metadata));

            if entry.file_type().is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                tar.append_data(&mut header, relative, std::io::empty())?;
            } else if entry.file_type().is_symlink() {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                tar.append_link(&mut header, relative, fs::read_link(path)?)?;
            } else {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(metadata.len());
                tar.append_data(&mut header, relative, fs::File::open(path)?)?;
            }
        }

        tar.into_inner()?.finish()?;
        Ok(())
    }
}

impl Compressor for TarGzCompressor {
    fn compress(&self, src_dir: &Path, dest_file: &Path) -> std::io::Result<()> {
        self.write_tar(src_dir, dest_file)
    }
}

// Reads the permission bits, falling back to typical modes where Unix modes don't exist
#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// Shells out to an external `tar` program: `tar -czf <dest> -C <src> .`
#[derive(Debug, Clone)]
pub struct CommandCompressor {
    program: PathBuf,
}

impl CommandCompressor {
    /// Uses `tar` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("tar"),
        }
    }

    /// Uses the tar executable at `program`.
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the program that will be invoked.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Default for CommandCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for CommandCompressor {
    fn compress(&self, src_dir: &Path, dest_file: &Path) -> std::io::Result<()> {
        let output = Command::new(&self.program)
            .arg("-czf")
            .arg(dest_file)
            .arg("-C")
            .arg(src_dir)
            .arg(".")
            .output()?;
        if !output.status.success() {
            return Err(Error::new(
                ErrorKind::Other,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}
