//! Logger setup shared by the binaries. The library itself only uses the
//! `log` macros.

use env_logger::{Builder, Env, Target};
use std::{fs::File, io::Write, path::Path};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "hub=info,coordinator=info,monitor=info";

/// Logs to stderr, or to `file` when something else (like the terminal
/// panel) owns the screen.
pub fn init_logger(file: Option<&Path>) -> std::io::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}][{}][{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or("<unknown>"),
            record.args()
        )
    });

    if let Some(path) = file {
        builder.target(Target::Pipe(Box::new(File::create(path)?)));
    }

    if let Err(e) = builder.try_init() {
        eprintln!("Logger was already set up, keeping it: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_the_first_logger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.log");

        init_logger(Some(path.as_path())).unwrap();
        assert!(path.exists());
        // Already set up, so this one only complains on stderr
        init_logger(None).unwrap();
        log::info!("still logging");
    }
}
