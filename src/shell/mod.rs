//! The `mfs>` REPL: tokenizes input lines, checks verb preconditions, and
//! maps core errors to the program's fixed error text.
//!
//! The session is a two-state machine: `Closed` (no image) and `Open` (one
//! volume). All output goes through a generic writer so tests capture it
//! byte-for-byte.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::debug;

use crate::error::MfsError;
use crate::fs::{Fat32Volume, RawDirEntry};

pub const PROMPT: &str = "mfs> ";

/// Longest accepted command line, newline included.
const MAX_LINE: usize = 255;
/// Tokens recognized per line; surplus tokens are discarded.
const MAX_TOKENS: usize = 5;

/// Whether the REPL should keep reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Continue,
    Quit,
}

pub struct Shell<W> {
    volume: Option<Fat32Volume<File>>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(out: W) -> Self {
        Self { volume: None, out }
    }

    /// Run the prompt loop until `quit`/`exit` or end of input.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                // End of input behaves like `exit`.
                return Ok(());
            }
            if self.run_line(&line)? == Status::Quit {
                return Ok(());
            }
        }
    }

    /// Dispatch a single command line.
    pub fn run_line(&mut self, line: &str) -> io::Result<Status> {
        let mut end = MAX_LINE.min(line.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        let tokens: Vec<&str> = line[..end].split_whitespace().take(MAX_TOKENS).collect();

        let Some(&verb) = tokens.first() else {
            // Blank input redraws the prompt.
            return Ok(Status::Continue);
        };

        match verb {
            "open" => {
                if self.volume.is_some() {
                    print_error(&mut self.out, &MfsError::AlreadyOpen)?;
                } else {
                    match tokens.get(1) {
                        None => writeln!(self.out, "Error: Filename not given.")?,
                        Some(path) => match Fat32Volume::open_path(Path::new(path)) {
                            Ok(volume) => self.volume = Some(volume),
                            Err(err) => print_error(&mut self.out, &err)?,
                        },
                    }
                }
                return Ok(Status::Continue);
            }
            "close" => {
                if self.volume.take().is_none() {
                    print_error(&mut self.out, &MfsError::NotOpen)?;
                } else {
                    debug!("closed image");
                }
                return Ok(Status::Continue);
            }
            "quit" | "exit" => {
                self.volume = None;
                return Ok(Status::Quit);
            }
            _ => {}
        }

        // Everything below requires an open image.
        let Some(volume) = self.volume.as_mut() else {
            writeln!(self.out, "Error: File system image must be opened first.")?;
            return Ok(Status::Continue);
        };

        match verb {
            "info" => {
                write!(self.out, "{}", volume.geometry().info_text())?;
            }
            "ls" => {
                for name in volume.list() {
                    self.out.write_all(&name)?;
                    self.out.write_all(b" \n")?;
                }
            }
            "stat" => match tokens.get(1) {
                None => writeln!(self.out, "Error: Filename not given.")?,
                Some(name) => match volume.stat(name) {
                    Ok(entry) => print_stat(&mut self.out, &entry)?,
                    Err(err) => print_error(&mut self.out, &err)?,
                },
            },
            "cd" => match tokens.get(1) {
                None => writeln!(self.out, "Error: Filename not given.")?,
                Some(name) => {
                    if let Err(err) = volume.change_dir(name) {
                        print_error(&mut self.out, &err)?;
                    }
                }
            },
            "get" => match tokens.get(1) {
                None => writeln!(self.out, "Error: Filename not given.")?,
                Some(name) => {
                    // Resolve before touching the host filesystem so a miss
                    // leaves no empty file behind.
                    match volume.stat(name) {
                        Err(err) => print_error(&mut self.out, &err)?,
                        Ok(_) => {
                            let result = File::create(name)
                                .map_err(MfsError::from)
                                .and_then(|mut host| volume.extract(name, &mut host));
                            if let Err(err) = result {
                                print_error(&mut self.out, &err)?;
                            }
                        }
                    }
                }
            },
            "read" => {
                if tokens.len() < 4 {
                    writeln!(
                        self.out,
                        "Error: Not enough arguments. ({} arguments given)",
                        tokens.len()
                    )?;
                } else {
                    let offset: u64 = tokens[2].parse().unwrap_or(0);
                    let length: u64 = tokens[3].parse().unwrap_or(0);
                    match volume.read_window(tokens[1], offset, length, &mut self.out) {
                        Ok(()) => self.out.write_all(b"\n")?,
                        Err(err) => print_error(&mut self.out, &err)?,
                    }
                }
            }
            "del" => match tokens.get(1) {
                None => writeln!(self.out, "Error: Filename not given.")?,
                Some(name) => {
                    if let Err(err) = volume.delete(name) {
                        print_error(&mut self.out, &err)?;
                    }
                }
            },
            "undel" => match tokens.get(1) {
                None => writeln!(self.out, "Error: Filename not given.")?,
                Some(name) => {
                    if let Err(err) = volume.undelete(name) {
                        print_error(&mut self.out, &err)?;
                    }
                }
            },
            _ => writeln!(self.out, "Error: Unknown command.")?,
        }

        Ok(Status::Continue)
    }
}

/// Map a core error to the program's fixed single-line error text.
fn print_error<W: Write>(out: &mut W, err: &MfsError) -> io::Result<()> {
    match err {
        MfsError::NotFound(_) => writeln!(out, "Error: File not found. "),
        MfsError::NotADirectory(_) => writeln!(out, "Error: Entry is not a directory. "),
        MfsError::ImageNotFound(_) => writeln!(out, "Error: File system image not found."),
        MfsError::AlreadyOpen => writeln!(out, "Error: File system image is already open."),
        MfsError::NotOpen => writeln!(out, "Error: File system not open."),
        MfsError::Io(err) => writeln!(out, "Error: {err}."),
    }
}

/// Render the `stat` listing in the program's fixed column layout.
fn print_stat<W: Write>(out: &mut W, entry: &RawDirEntry) -> io::Result<()> {
    write!(out, "Name:               ")?;
    out.write_all(&entry.name())?;
    out.write_all(b" \n")?;
    writeln!(out, "Attribute:          {:#x}", entry.attr())?;
    writeln!(out, "FirstClusterHigh:   {} ", entry.first_cluster_high())?;
    writeln!(out, "FirstClusterLow:    {} ", entry.first_cluster_low())?;
    writeln!(out, "FileSize:           {} ", entry.file_size())?;
    Ok(())
}
