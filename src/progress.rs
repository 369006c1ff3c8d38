// User-facing progress lines on stdout, separate from the tracing log.

use colored::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Error,
}

/// Color-coded marker shown in front of a progress line.
pub fn format_status(status: Status) -> ColoredString {
    match status {
        Status::Ok => "OK".green(),
        Status::Warn => "WARN".yellow(),
        Status::Error => "ERRO".red(),
    }
}

/// Prints progress for a run; `quiet()` discards everything (tests, scripted runs).
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    pub fn stdout() -> Self {
        Self { enabled: true }
    }

    pub fn quiet() -> Self {
        Self { enabled: false }
    }

    pub fn section(&self, title: &str) {
        if self.enabled {
            println!("\n# {}", title.bold());
        }
    }

    pub fn region(&self, region: &str) {
        if self.enabled {
            println!("\n# Region: {}", region.cyan().bold());
        }
    }

    pub fn compartment(&self, path: &str) {
        if self.enabled {
            println!(" - Compartment: {}", path.blue());
        }
    }

    pub fn line(&self, status: Status, text: &str) {
        if self.enabled {
            println!("   [{}] {}", format_status(status), text);
        }
    }

    pub fn note(&self, text: &str) {
        if self.enabled {
            println!("{}", text);
        }
    }
}
