#[macro_use]
extern crate log;
#[macro_use]
extern crate clap;

#[macro_use]
pub mod errors;
pub mod codec;
pub mod common;
pub mod compress;
pub mod decompress;
pub mod dedup;
pub mod parser;
pub mod proto;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process;

use clap::{App, Arg};
use log::LevelFilter;

use crate::common::logger::SimpleLogger;
use crate::errors::{OpError, OpErrorKind, OpResult};

enum Mode {
    Compress,
    Decompress,
}

struct Options {
    mode: Mode,
    input: PathBuf,
    output: PathBuf,
    log_level_filter: LevelFilter,
}

fn main() {
    let options = match parse_args() {
        Ok(o) => o,
        Err(usage) => {
            println!("{}", usage);
            process::exit(0);
        }
    };

    SimpleLogger::init(options.log_level_filter).expect("unable to initialize logger");
    info!(target: "main", "Starting btcompress v{} ...", env!("CARGO_PKG_VERSION"));

    let result = run(&options);
    match result {
        Ok(()) => info!(target: "main", "Fin."),
        Err(e) => {
            error!(target: "main", "{}", e);
            process::exit(1);
        }
    }
}

fn run(options: &Options) -> OpResult<()> {
    if options.input == options.output {
        return Err(OpError::new(OpErrorKind::InvalidArgsError)
            .join_msg("input and output must be different files"));
    }
    let mut input = BufReader::new(File::open(&options.input)?);
    let mut output = BufWriter::new(open_output(&options.output)?);
    match options.mode {
        Mode::Compress => crate::compress::compress(&mut input, &mut output)?,
        Mode::Decompress => crate::decompress::decompress(&mut input, &mut output)?,
    }
    Ok(())
}

/// Opens the output file for read+write, since the size-slot backpatch
/// pattern seeks backward into already-written bytes.
fn open_output(path: &std::path::Path) -> std::io::Result<File> {
    File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Returns the rendered usage/help text as the error value -- any malformed
/// invocation prints it and exits 0 rather than treating argv shape as a
/// runtime failure.
fn parse_args() -> Result<Options, String> {
    let app = App::new("btcompress")
        .version(crate_version!())
        .author("gcarq <michael.egger@tsn.at>")
        .about("Compresses and decompresses raw Bitcoin blk*.dat block files")
        .arg(
            Arg::with_name("compress")
                .short("c")
                .takes_value(true)
                .number_of_values(2)
                .value_names(&["INPUT", "OUTPUT"])
                .help("Compresses a raw blk*.dat file into the compact container format")
                .conflicts_with("decompress"),
        )
        .arg(
            Arg::with_name("decompress")
                .short("d")
                .takes_value(true)
                .number_of_values(2)
                .value_names(&["INPUT", "OUTPUT"])
                .help("Decompresses a compact container back into a raw blk*.dat file")
                .conflicts_with("compress"),
        )
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Increases verbosity level. Info=0, Debug=1, Trace=2+ (default: 0)"),
        );

    let usage = {
        let mut help = Vec::new();
        app.clone().write_long_help(&mut help).ok();
        String::from_utf8_lossy(&help).into_owned()
    };

    let matches = match app.get_matches_safe() {
        Ok(m) => m,
        Err(_) => return Err(usage),
    };

    let log_level_filter = match matches.occurrences_of("verbosity") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let (mode, values) = if let Some(values) = matches.values_of("compress") {
        (Mode::Compress, values)
    } else if let Some(values) = matches.values_of("decompress") {
        (Mode::Decompress, values)
    } else {
        return Err(usage);
    };

    let paths: Vec<&str> = values.collect();
    if paths.len() != 2 {
        return Err(usage);
    }

    Ok(Options {
        mode,
        input: PathBuf::from(paths[0]),
        output: PathBuf::from(paths[1]),
        log_level_filter,
    })
}
