// remoted-keymap - keymap compiler
// Parses a text keymap and streams binary patch records to stdout, so
// untrusted keymap files can be handled outside the daemon

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use remoted_core::exit;
use remoted_core::keymap;
use remoted_core::names;
use remoted_core::table::KeyTable;

#[derive(Parser, Debug)]
#[command(name = "remoted-keymap")]
#[command(version)]
#[command(about = "Compile a text keymap into binary patch records")]
struct Args {
    /// Keymap file to compile
    #[arg(value_name = "FILE")]
    keymap: PathBuf,

    /// Scancode namespace size; defaults to the compiled table length
    #[arg(long, value_name = "N")]
    table_size: Option<usize>,

    /// Exit successfully when the keymap file does not exist
    #[arg(long)]
    ignore_missing: bool,
}

fn run(args: &Args) -> Result<(), u8> {
    let file = match File::open(&args.keymap) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound && args.ignore_missing => {
            return Ok(());
        }
        Err(err) => {
            log::error!("failed to open keymap '{}': {err}", args.keymap.display());
            return Err(exit::NOINPUT);
        }
    };

    let table_size = args
        .table_size
        .unwrap_or_else(|| KeyTable::with_defaults().len());
    let origin = args.keymap.display().to_string();

    let records = keymap::parse(BufReader::new(file), &origin).map_err(|err| {
        log::error!("failed to read keymap '{origin}': {err}");
        exit::IOERR
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in records {
        if record.scancode as usize >= table_size {
            log::warn!("{origin}: scancode {} out of range", record.scancode);
            continue;
        }
        if record.keyid >= u32::from(names::MAX_KEY_CODE) {
            log::warn!("{origin}: unsupported key id {}", record.keyid);
            continue;
        }
        record.write_to(&mut out).map_err(|err| {
            log::error!("failed to write record: {err}");
            exit::OSERR
        })?;
    }
    out.flush().map_err(|err| {
        log::error!("failed to write record: {err}");
        exit::OSERR
    })?;

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::from(exit::OK);
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(exit::USAGE);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::from(exit::OK),
        Err(code) => ExitCode::from(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_compiled_table_size() {
        let args = Args::parse_from(["remoted-keymap", "remote.map"]);
        assert_eq!(args.keymap, PathBuf::from("remote.map"));
        assert_eq!(args.table_size, None);
        assert!(!args.ignore_missing);
    }

    #[test]
    fn test_missing_file_is_tolerated_when_asked() {
        let args = Args::parse_from([
            "remoted-keymap",
            "/nonexistent/remote.map",
            "--ignore-missing",
        ]);
        assert!(run(&args).is_ok());
    }

    #[test]
    fn test_missing_file_is_noinput_otherwise() {
        let args = Args::parse_from(["remoted-keymap", "/nonexistent/remote.map"]);
        assert_eq!(run(&args), Err(exit::NOINPUT));
    }
}
