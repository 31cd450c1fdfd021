//! `berth fix` command

use anyhow::Result;

use crate::cli::GenerateArgs;
use crate::commands::update::run;

pub fn execute(args: GenerateArgs) -> Result<()> {
    run(args, true)
}
