//! Interactive read/write shell over FAT32 disk image files.
//!
//! The `fs` module is the core: it decodes the BIOS Parameter Block, follows
//! cluster chains through the File Allocation Table, and reads and mutates
//! 8.3 directory entries with sector-accurate I/O. The `shell` module is the
//! REPL that drives it.

pub mod error;
pub mod fs;
pub mod shell;
