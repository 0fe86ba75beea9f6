//! Unified logging system

use colored::*;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

static VERBOSE: AtomicBool = AtomicBool::new(false);
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_FILE_FAILED: AtomicBool = AtomicBool::new(false);

pub struct Log;

impl Log {
	pub fn set_verbose(enabled: bool) {
		VERBOSE.store(enabled, Ordering::Relaxed);
	}

	pub fn is_verbose() -> bool {
		VERBOSE.load(Ordering::Relaxed)
	}

	/// Mirror every log line into `path` (appending). Fails with
	/// `AlreadyExists` once a log file has been set for this process.
	pub fn set_file(path: &Path) -> std::io::Result<()> {
		if LOG_FILE.get().is_some() {
			return Err(already_set());
		}
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		LOG_FILE.set(Mutex::new(file)).map_err(|_| already_set())
	}
}

fn already_set() -> std::io::Error {
	std::io::Error::new(std::io::ErrorKind::AlreadyExists, "log file is already set for this process")
}

fn to_file(level: &str, msg: &str) {
	let Some(file) = LOG_FILE.get() else { return };
	let written = match file.lock() {
		Ok(mut file) => writeln!(file, "{} {:<5} {}", chrono::Utc::now().to_rfc3339(), level, msg),
		Err(_) => Err(std::io::Error::other("log file lock poisoned")),
	};
	// Warn once; later lines still go to stderr
	if let Err(e) = written {
		if !LOG_FILE_FAILED.swap(true, Ordering::Relaxed) {
			eprintln!("{} Log file write failed: {}", "⚠".bright_yellow().bold(), e);
		}
	}
}

pub fn info(msg: &str) {
	to_file("INFO", msg);
	eprintln!("{} {}", "ℹ".bright_blue().bold(), msg.bright_white());
}

pub fn success(msg: &str) {
	to_file("INFO", msg);
	eprintln!("{} {}", "✓".bright_green().bold(), msg.bright_white());
}

pub fn warn(msg: &str) {
	to_file("WARN", msg);
	eprintln!("{} {}", "⚠".bright_yellow().bold(), msg.bright_white());
}

pub fn error(msg: &str) {
	to_file("ERROR", msg);
	eprintln!("{} {}", "✗".bright_red().bold(), msg.bright_white());
}

pub fn debug(msg: &str) {
	if Log::is_verbose() {
		to_file("DEBUG", msg);
		eprintln!("{} {}", "⚙".bright_black().bold(), msg.dimmed());
	}
}

pub fn header(text: &str) {
	eprintln!("\n{}", text.bright_blue().bold());
}

pub fn banner() {
	header(&format!("─── semdedup v{} ───", env!("CARGO_PKG_VERSION")));
}

/// Clickable file path (OSC 8 terminal hyperlink)
pub fn path_link(path: &Path, max_len: usize) -> String {
	let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

	let uri = if cfg!(windows) {
		let path_str = absolute.to_string_lossy();
		let cleaned = path_str.strip_prefix(r"\\?\").unwrap_or(&path_str);
		format!("file:///{}", cleaned.replace('\\', "/"))
	} else {
		format!("file://{}", absolute.display())
	};

	let display = path.display().to_string();
	let chars: Vec<char> = display.chars().collect();
	let display_name = if chars.len() > max_len && max_len > 6 {
		let head: String = chars[..max_len / 2].iter().collect();
		let tail: String = chars[chars.len() - (max_len / 2 - 3)..].iter().collect();
		format!("{}...{}", head, tail)
	} else {
		display
	};

	format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", uri, display_name)
}
