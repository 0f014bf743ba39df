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

//! Assemble and read binary Deb packages.
//!
//! Binary packages contain executable programs, documentation for said executables,
//! configuration files, libraries, etc. Here they are put together from two trees
//! that already exist on disk: the control tree and the data tree.
//!
//! # Example
//!
//! ```
//! use deb_assemble::*;
//!
//! fn main() -> deb_assemble::Result<()> {
//!     let deb = DebAssembler::new("pkg/control", "pkg/data", "target/deb", "target/deb-tmp")
//!         .set_revision("001")
//!         .set_source_date_epoch_from_env()
//!         .assemble(&FixedVersion("1.2.3".to_string()), &TarGzCompressor::new())?;
//!
//!     println!("wrote {}", deb.display());
//!     Ok(())
//! }
//! ```

use crate::compress::Compressor;
use crate::control::ControlDocument;
use crate::error::*;
use crate::member::{package_bytes, ArchiveMember, AR_MAGIC};
use crate::size::{folder_size_kb_with, SizeRounding};
use crate::version::VersionResolver;

use std::fs;
use std::io::{Error, ErrorKind, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, info};
use walkdir::WalkDir;

/// Name of the archive member identifying the package format.
pub const DEBIAN_BINARY: &str = "debian-binary";
/// Name of the archive member holding the compressed control tree.
pub const CONTROL_TAR_GZ: &str = "control.tar.gz";
/// Name of the archive member holding the compressed data tree.
pub const DATA_TAR_GZ: &str = "data.tar.gz";

const FORMAT_VERSION: &[u8] = b"2.0\n";

/// Assembles a `.deb` out of a control tree and a data tree.
///
/// The control tree must hold a `control` file with at least the `Package`
/// and `Architecture` fields. Its `Version` and `Installed-Size` fields are
/// written by [`assemble`](Self::assemble), and the file is saved back into
/// the control tree before anything gets compressed.
///
/// The temporary directory is wiped at the start of every run, so it must
/// not be shared between concurrent runs or point at anything worth keeping.
#[derive(Debug, Clone)]
pub struct DebAssembler {
    control_dir: PathBuf,        // Tree holding `control` and maintainer scripts
    data_dir: PathBuf,           // Tree holding the installed files
    out_dir: PathBuf,            // Where the finished package goes
    temp_dir: PathBuf,           // Scratch space for the staged members
    revision: String,            // Debian revision appended to the version in the filename
    mtime: Option<u64>,          // Fixed member mtime, otherwise each staged file's own
    size_rounding: SizeRounding, // How Installed-Size rounds partial KiB
    md5sums: bool,               // Whether to generate control/md5sums
}

impl DebAssembler {
    /// Creates a new DebAssembler over the given directories.
    pub fn new<C, D, O, T>(control_dir: C, data_dir: D, out_dir: O, temp_dir: T) -> Self
    where
        C: Into<PathBuf>,
        D: Into<PathBuf>,
        O: Into<PathBuf>,
        T: Into<PathBuf>,
    {
        Self {
            control_dir: control_dir.into(),
            data_dir: data_dir.into(),
            out_dir: out_dir.into(),
            temp_dir: temp_dir.into(),
            revision: "1".to_string(),
            mtime: None,
            size_rounding: SizeRounding::Nearest,
            md5sums: false,
        }
    }

    /// Sets the Debian revision.
    pub fn set_revision(mut self, revision: &str) -> Self {
        self.revision = revision.to_string();
        self
    }

    /// Sets a fixed modification time for the archive members, in Unix seconds.
    pub fn set_mtime(mut self, mtime: Option<u64>) -> Self {
        self.mtime = mtime;
        self
    }

    /// Takes the member mtime from `SOURCE_DATE_EPOCH` if it's set to a number.
    ///
    /// See <https://reproducible-builds.org/specs/source-date-epoch/>.
    pub fn set_source_date_epoch_from_env(mut self) -> Self {
        if let Some(epoch) = std::env::var("SOURCE_DATE_EPOCH")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            self.mtime = Some(epoch);
        }
        self
    }

    /// Sets how `Installed-Size` rounds partial KiB.
    pub fn set_size_rounding(mut self, rounding: SizeRounding) -> Self {
        self.size_rounding = rounding;
        self
    }

    /// Sets whether an `md5sums` file is generated in the control tree.
    pub fn set_md5sums(mut self, md5sums: bool) -> Self {
        self.md5sums = md5sums;
        self
    }

    /// Returns the control tree.
    pub fn control_dir(&self) -> &PathBuf {
        &self.control_dir
    }

    /// Returns the data tree.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the output directory.
    pub fn out_dir(&self) -> &PathBuf {
        &self.out_dir
    }

    /// Returns the temporary directory.
    pub fn temp_dir(&self) -> &PathBuf {
        &self.temp_dir
    }

    /// Returns the Debian revision.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Returns the fixed member mtime, if any.
    pub fn mtime(&self) -> Option<u64> {
        self.mtime
    }

    /// Returns how `Installed-Size` is rounded.
    pub fn size_rounding(&self) -> SizeRounding {
        self.size_rounding
    }

    /// Returns whether an `md5sums` file is generated.
    pub fn md5sums(&self) -> bool {
        self.md5sums
    }

    /// Returns the path of the control file inside the control tree.
    pub fn control_path(&self) -> PathBuf {
        self.control_dir.join("control")
    }

    /// Builds the package and returns the path of the written `.deb`.
    ///
    /// # Errors
    ///
    /// Every step is fail-fast. If a later step fails, the control file may
    /// already be patched and the temporary directory may hold partial output.
    /// The `.deb` itself is written in one go at the very end.
    pub fn assemble<V, C>(&self, versions: &V, compressor: &C) -> Result<PathBuf>
    where
        V: VersionResolver + ?Sized,
        C: Compressor + ?Sized,
    {
        // Resolve
        let version = versions
            .resolve()
            .map_err(DebError::VersionResolution)?
            .trim()
            .to_string();
        if version.is_empty() {
            return Err(DebError::VersionResolution(Error::new(
                ErrorKind::InvalidData,
                "version resolver returned an empty version",
            )));
        }
        let control_path = self.control_path();
        let mut control = ControlDocument::read(&control_path)?;
        let package = control.required_property("Package")?.to_string();
        let architecture = control.required_property("Architecture")?.to_string();
        debug!("resolved {} {} for {}", package, version, architecture);

        // Patch
        let installed_size = folder_size_kb_with(&self.data_dir, self.size_rounding)?;
        debug!("installed size of {} is {} KiB", self.data_dir.display(), installed_size);
        control.set_property("Version", &version)?;
        control.set_property("Installed-Size", &installed_size.to_string())?;
        control.write(&control_path)?;
        if self.md5sums {
            write_md5sums(&self.data_dir, &self.control_dir.join("md5sums"))?;
        }

        // Stage
        reset_dir(&self.temp_dir)?;

        // Compress
        let control_tar = self.temp_dir.join(CONTROL_TAR_GZ);
        let data_tar = self.temp_dir.join(DATA_TAR_GZ);
        run_compressor(compressor, &self.control_dir, &control_tar)?;
        run_compressor(compressor, &self.data_dir, &data_tar)?;
        let debian_binary = self.temp_dir.join(DEBIAN_BINARY);
        fs::write(&debian_binary, FORMAT_VERSION).map_err(DebError::io_path(&debian_binary))?;

        // Assemble
        let members = vec![
            ArchiveMember::from_path(&debian_binary, self.mtime)?,
            ArchiveMember::from_path(&control_tar, self.mtime)?,
            ArchiveMember::from_path(&data_tar, self.mtime)?,
        ];
        fs::create_dir_all(&self.out_dir).map_err(DebError::io_path(&self.out_dir))?;
        let out_path = self.out_dir.join(package_file_name(
            &package,
            &version,
            &self.revision,
            &architecture,
        ));
        fs::write(&out_path, package_bytes(&members)).map_err(DebError::io_path(&out_path))?;

        // Report
        for member in &members {
            info!("{}: {} bytes", member.name(), member.size());
        }
        info!("wrote {}", out_path.display());

        Ok(out_path)
    }
}

/// Formats a package's filename: `{package}_{version}-{revision}_{architecture}.deb`
pub fn package_file_name(package: &str, version: &str, revision: &str, architecture: &str) -> String {
    format!("{}_{}-{}_{}.deb", package, version, revision, architecture)
}

// Deletes `dir` if it exists and creates it empty
fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(DebError::io_path(dir))?;
    }
    fs::create_dir_all(dir).map_err(DebError::io_path(dir))?;
    debug!("reset {}", dir.display());
    Ok(())
}

// Runs the compressor, treating a missing result as a failure too
fn run_compressor<C: Compressor + ?Sized>(compressor: &C, src: &Path, dest: &Path) -> Result<()> {
    debug!("compressing {} into {}", src.display(), dest.display());
    let failed = |source| DebError::Compression {
        src: src.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    };
    compressor.compress(src, dest).map_err(failed)?;
    if !dest.is_file() {
        return Err(failed(Error::new(
            ErrorKind::NotFound,
            "compressor did not produce an output file",
        )));
    }
    Ok(())
}

// Writes `<md5>  <path>` for every regular file under `data_dir`, sorted by path
fn write_md5sums(data_dir: &Path, dest: &Path) -> Result<()> {
    let mut write_out = String::new();
    for entry in WalkDir::new(data_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(data_dir) {
            Ok(path) => path,
            Err(e) => return Err(DebError::Io(Error::new(ErrorKind::Other, e))),
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(entry.path()).map_err(DebError::io_path(entry.path()))?;
        write_out.push_str(&format!("{:x}  {}\n", md5::compute(contents), relative));
    }
    fs::write(dest, write_out).map_err(DebError::io_path(dest))
}

/// A finished `.deb` read back into its three members.
///
/// Only packages laid out the way dpkg expects are accepted: the `ar` magic,
/// then `debian-binary`, then the control tarball, then the data tarball.
#[derive(Debug)]
pub struct DebArchive {
    members: Vec<ArchiveMember>,
}

impl DebArchive {
    /// Reads a package from `input`.
    pub fn read<R: Read>(mut input: R) -> Result<Self> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        if !bytes.starts_with(AR_MAGIC) {
            return Err(DebError::MalformedArchive("missing ar magic".to_string()));
        }

        let mut archive = ar::Archive::new(bytes.as_slice());
        let mut members = Vec::new();
        while let Some(entry) = archive.next_entry() {
            let mut entry = entry?;
            let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();
            let mtime = entry.header().mtime();
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            members.push(ArchiveMember::new(&name, mtime, content)?);
        }

        let names = members.iter().map(ArchiveMember::name).collect::<Vec<&str>>();
        if names != [DEBIAN_BINARY, CONTROL_TAR_GZ, DATA_TAR_GZ] {
            return Err(DebError::MalformedArchive(format!(
                "unexpected members {:?}",
                names
            )));
        }
        if members[0].content().as_slice() != FORMAT_VERSION {
            return Err(DebError::MalformedArchive(
                "unsupported debian-binary version".to_string(),
            ));
        }

        Ok(Self { members })
    }

    /// Reads the package at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::read(fs::File::open(path).map_err(DebError::io_path(path))?)
    }

    /// Returns the members in archive order.
    pub fn members(&self) -> &Vec<ArchiveMember> {
        &self.members
    }

    /// Returns the compressed control tarball.
    pub fn control_tar(&self) -> &Vec<u8> {
        self.members[1].content()
    }

    /// Returns the compressed data tarball.
    pub fn data_tar(&self) -> &Vec<u8> {
        self.members[2].content()
    }

    /// Decompresses the control tarball and parses its `control` file.
    pub fn control(&self) -> Result<ControlDocument> {
        let mut control_tar = tar::Archive::new(GzDecoder::new(self.control_tar().as_slice()));
        for entry_result in control_tar.entries()? {
            let mut entry = entry_result?;
            let path = entry.path()?.into_owned();
            // External tar programs store entries as `./control`
            if path.strip_prefix(".").unwrap_or(&path) == Path::new("control") {
                let mut buf: Vec<u8> = Vec::new();
                entry.read_to_end(&mut buf)?;
                return ControlDocument::from_bytes(buf);
            }
        }
        Err(DebError::MalformedArchive(
            "control tarball has no control file".to_string(),
        ))
    }
}
