// file: src/logging/console.rs
// version: 1.0.0
// guid: ccf3afbb-a1e0-4cfc-a14d-cffabf3704cc

//! Colored console reporter for user-facing command output

use colored::{ColoredString, Colorize};

const SEPARATOR: &str = "==================================";

/// Prefixed, optionally colored output on stdout
#[derive(Debug, Clone, Copy)]
pub struct Console {
    use_colors: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Create a console whose color setting follows the environment
    pub fn new() -> Self {
        Self::with_colors(should_use_colors(|key| std::env::var(key).ok()))
    }

    /// Create a console with colors forced on or off
    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn uses_colors(&self) -> bool {
        self.use_colors
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.use_colors {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn prefixed(&self, prefix: &str, style: fn(&str) -> ColoredString, message: &str) -> String {
        format!("{} {}", self.paint(prefix, style), message)
    }

    pub fn format_info(&self, message: &str) -> String {
        self.prefixed("[INFO]", |s| s.blue(), message)
    }

    pub fn format_success(&self, message: &str) -> String {
        self.prefixed("[SUCCESS]", |s| s.green(), message)
    }

    pub fn format_warning(&self, message: &str) -> String {
        self.prefixed("[WARNING]", |s| s.yellow().bold(), message)
    }

    pub fn format_error(&self, message: &str) -> String {
        self.prefixed("[ERROR]", |s| s.red(), message)
    }

    pub fn format_progress(&self, message: &str) -> String {
        self.prefixed("[PROGRESS]", |s| s.cyan(), message)
    }

    pub fn format_step(&self, step: usize, message: &str) -> String {
        self.prefixed(&format!("[STEP {}]", step), |s| s.purple(), message)
    }

    pub fn format_key_value(&self, key: &str, value: &str) -> String {
        format!("   {} {}", self.paint(&format!("{}:", key), |s| s.bold()), value)
    }

    pub fn format_list_item(&self, message: &str) -> String {
        format!("   {} {}", self.paint("✓", |s| s.green()), message)
    }

    pub fn format_command(&self, command: &str) -> String {
        format!("   {}", self.paint(&format!("$ {}", command), |s| s.white()))
    }

    /// Title line plus an `=` rule at least as wide as the title
    pub fn format_header(&self, title: &str) -> String {
        let rule = if title.chars().count() > SEPARATOR.len() {
            "=".repeat(title.chars().count())
        } else {
            SEPARATOR.to_string()
        };
        format!(
            "{}\n{}",
            self.paint(title, |s| s.blue().bold()),
            self.paint(&rule, |s| s.blue())
        )
    }

    pub fn info(&self, message: impl AsRef<str>) {
        println!("{}", self.format_info(message.as_ref()));
    }

    pub fn success(&self, message: impl AsRef<str>) {
        println!("{}", self.format_success(message.as_ref()));
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        println!("{}", self.format_warning(message.as_ref()));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        println!("{}", self.format_error(message.as_ref()));
    }

    pub fn progress(&self, message: impl AsRef<str>) {
        println!("{}", self.format_progress(message.as_ref()));
    }

    pub fn step(&self, step: usize, message: impl AsRef<str>) {
        println!("{}", self.format_step(step, message.as_ref()));
    }

    pub fn plain(&self, message: impl AsRef<str>) {
        println!("{}", message.as_ref());
    }

    pub fn header(&self, title: &str) {
        println!("{}", self.format_header(title));
    }

    pub fn separator(&self) {
        println!();
    }

    pub fn key_value(&self, key: &str, value: impl AsRef<str>) {
        println!("{}", self.format_key_value(key, value.as_ref()));
    }

    pub fn list(&self, message: impl AsRef<str>) {
        println!("{}", self.format_list_item(message.as_ref()));
    }

    pub fn command(&self, command: &str) {
        println!("{}", self.format_command(command));
    }
}

/// Decide whether to emit ANSI colors from the given environment lookup.
///
/// Windows consoles only get colors when explicitly forced. Elsewhere
/// `NO_COLOR` or `CLICOLOR=0` turn them off.
pub fn should_use_colors<F>(env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(windows) {
        let forced = env("FORCE_COLOR").as_deref() == Some("true")
            || env("CLICOLOR_FORCE").as_deref() == Some("1");
        if !forced {
            return false;
        }
    }

    if env("NO_COLOR").map(|v| !v.is_empty()).unwrap_or(false) {
        return false;
    }

    env("CLICOLOR").as_deref() != Some("0")
}
