use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use log::Log;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

pub struct MainLogger {
    write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>,
}

impl MainLogger {
    fn new(write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>) -> Self {
        Self { write_logger }
    }
}

impl Log for MainLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.write_logger.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.write_logger.log(record);

        // problems also go to stderr so they show up in the host's console
        if record.level() <= log::Level::Warn {
            eprintln!("{}:{} -- {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        self.write_logger.flush();
    }
}

pub fn log_dir(cache_dir: &str) -> PathBuf {
    Path::new(cache_dir).join("logs/")
}

/// Installs the global logger. Fails if a logger is already installed.
pub fn init(cache_dir: &str) -> Result<()> {
    let path = log_dir(cache_dir).join("main.log");
    let log = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let write_logger = WriteLogger::new(LevelFilter::Info, config, log);
    let main_logger = MainLogger::new(write_logger);
    log::set_boxed_logger(Box::new(main_logger))?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}

/// Zips `main.log` and its rotated files into `target_file_path`.
pub fn export(cache_dir: &str, target_file_path: &str) -> Result<()> {
    let mut zip = zip::ZipWriter::new(File::create(target_file_path)?);
    let default_options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let mut count = 0;
    for entry in (fs::read_dir(log_dir(cache_dir))?).flatten() {
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|x| x.to_str())
            .is_some_and(|x| x.starts_with("main.log"));
        if path.is_file() && is_log {
            if let Some(name) = path.strip_prefix(cache_dir)?.to_str() {
                zip.start_file(name, default_options)?;
                let mut log_file = File::open(&path)?;
                io::copy(&mut log_file, &mut zip)?;
                count += 1;
            }
        }
    }

    zip.finish()?;
    info!("[logs] exported {} log file(s) to {}", count, target_file_path);
    Ok(())
}
