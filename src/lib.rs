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

//! A pure Rust library for assembling binary Deb packages out of directory trees
//! that were built elsewhere.
//!
//! You hand it a control tree (the `control` file plus maintainer scripts) and a
//! data tree (everything that gets installed), and it patches `Version` and
//! `Installed-Size`, compresses both trees and writes the final `.deb`.

pub mod binary;
pub mod compress;
pub mod control;
mod error;
pub mod member;
pub mod size;
pub mod version;

pub use binary::{DebArchive, DebAssembler};
pub use compress::{CommandCompressor, Compressor, TarGzCompressor};
pub use control::ControlDocument;
pub use error::*;
pub use member::ArchiveMember;
pub use size::{folder_size_kb, SizeRounding};
pub use version::{FixedVersion, VersionFile, VersionResolver};
