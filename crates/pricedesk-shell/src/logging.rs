use crate::config::ShellConfig;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub struct LogGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

struct MultiWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// stderr always; a log file too when a log directory is configured. The
/// worker owns stdout/stdin pipes, so host logs stay off stdout.
pub fn init(config: &ShellConfig) -> Option<LogGuard> {
    let level =
        std::env::var("PRICEDESK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file = config.log_dir.as_deref().and_then(open_log_file);
    let writer_file = file.clone();
    let make_writer = BoxMakeWriter::new(move || MultiWriter {
        file: writer_file.clone(),
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(LogGuard { file })
}

fn open_log_file(dir: &Path) -> Option<Arc<Mutex<File>>> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("log_dir_error: {err}");
        return None;
    }
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("pricedesk.log"))
    {
        Ok(file) => Some(Arc::new(Mutex::new(file))),
        Err(err) => {
            eprintln!("log_file_error: {err}");
            None
        }
    }
}
