use std::ffi::OsString;
use std::io::{self, Write};

use clap::Parser;

mod check;
mod cli_args;
mod disasm;
mod error_map;
mod logging;
mod run;

pub(crate) use cli_args::{CheckArgs, Cli, DisasmArgs, Mode, RunArgs};
pub(crate) use error_map::emit_error;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(error) = logging::init(cli.log_level.as_deref()) {
        return emit_error(&mut out, &error);
    }
    match run(cli, &mut out) {
        Ok(code) => code,
        Err(error) => emit_error(&mut out, &error),
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<i32> {
    match cli.command {
        Mode::Run(args) => run::run_script(&args, out),
        Mode::Disasm(args) => disasm::disasm(&args, out),
        Mode::Check(args) => check::check(&args, out),
    }
}

#[cfg(test)]
mod tests;
