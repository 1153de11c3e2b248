// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::process;

use structopt::StructOpt;

use seltrace::cli::{self, Seltrace};

fn setup_logger(opt: &Seltrace) -> Result<(), fern::InitError> {
    let level = if opt.verbose {
        log::LevelFilter::Debug
    } else if opt.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

pub fn main() {
    let opt = Seltrace::from_args();
    if let Err(e) = setup_logger(&opt) {
        eprintln!("unable to set up logging: {}", e);
    }

    if let Err(e) = cli::run(opt) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}
