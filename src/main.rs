use std::io;

use anyhow::Result;

use mfs::shell::Shell;

fn main() -> Result<()> {
    env_logger::init();

    let stdin = io::stdin();
    let mut shell = Shell::new(io::stdout());
    shell.run(stdin.lock())?;
    Ok(())
}
