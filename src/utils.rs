use std::{env, fs, io::Write, path::PathBuf};

use chrono::Utc;
use env_logger::Builder;
use log::LevelFilter;

use crate::HOME;

pub fn init_logger(debug: bool, systemd: bool) {
    let mut builder = Builder::new();

    if systemd {
        builder.format(|formatter, record| {
            writeln!(formatter, "[{}]: {}", record.level(), record.args())
        });
    } else {
        builder.format(|formatter, record| {
            writeln!(
                formatter,
                "{} [{}] ({}): {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S %z"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    }

    if let Ok(var) = env::var("RUST_LOG") {
        builder.parse_filters(&var);
    } else if debug {
        builder.filter(None, LevelFilter::Debug);
    } else {
        // if no RUST_LOG provided, default to logging at the Info level
        builder.filter(None, LevelFilter::Info);
    }

    builder.init();
}

/// The path of `file` inside the application data folder, creating the
/// folder if it is missing.
///
/// # Errors
///
/// If the folder cannot be created.
pub fn data_file(file: &str) -> anyhow::Result<PathBuf> {
    let mut path = dirs::data_dir().unwrap_or_default();
    path.push(HOME);
    fs::create_dir_all(&path)?;

    path.push(file);
    Ok(path)
}
