//! Engine configuration
//!
//! Options are declared once in [`OPTIONS`]. The CLI applies `key=value`
//! overrides through [`EngineConfig::apply`] and the `options` subcommand
//! renders the same table with [`render_options_table`].

use crate::core::error::{EngineError, EngineResult};
use crate::core::extent::ExtentMode;
use std::fmt::Write;

/// Default chunk size in base pairs
pub const DEFAULT_CHUNK_SIZE: u64 = 10_000_000;

/// Value type of a configuration option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Integer greater than zero
    PositiveInt,
    /// Positive integer, or `auto` for host parallelism
    Threads,
    /// One of a fixed set of names
    Choice(&'static [&'static str]),
    /// `true` / `false`
    Flag,
}

impl OptionKind {
    fn describe(&self) -> String {
        match self {
            OptionKind::PositiveInt => "int > 0".to_string(),
            OptionKind::Threads => "int > 0 | auto".to_string(),
            OptionKind::Choice(choices) => choices.join("|"),
            OptionKind::Flag => "bool".to_string(),
        }
    }
}

/// Static description of one option
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub default: &'static str,
    pub required: bool,
    pub help: &'static str,
}

/// Every option the engine recognizes
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: "chunk_size",
        kind: OptionKind::PositiveInt,
        default: "10000000",
        required: false,
        help: "Bases per chunk dispatched to a worker",
    },
    OptionSpec {
        name: "thread_count",
        kind: OptionKind::Threads,
        default: "auto",
        required: false,
        help: "Worker threads",
    },
    OptionSpec {
        name: "extent_mode",
        kind: OptionKind::Choice(&["intersection", "union"]),
        default: "intersection",
        required: false,
        help: "How input extents are combined",
    },
    OptionSpec {
        name: "fail_on_empty_domain",
        kind: OptionKind::Flag,
        default: "false",
        required: false,
        help: "Fail instead of writing nothing when no chromosome is left",
    },
];

/// Look up an option by name
pub fn option(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|o| o.name == name)
}

/// Render the option table as aligned text
pub fn render_options_table() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:<20} {:<14} {:<9} {}",
        "OPTION", "TYPE", "DEFAULT", "REQUIRED", "DESCRIPTION"
    );
    for opt in OPTIONS {
        let _ = writeln!(
            out,
            "{:<22} {:<20} {:<14} {:<9} {}",
            opt.name,
            opt.kind.describe(),
            opt.default,
            if opt.required { "yes" } else { "no" },
            opt.help
        );
    }
    out
}

/// Split a `key=value` assignment
pub fn parse_assignment(s: &str) -> EngineResult<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().replace('-', "_"), value.trim().to_string()))
        }
        _ => Err(EngineError::InvalidConfig(format!(
            "expected key=value, got '{}'",
            s
        ))),
    }
}

/// Host parallelism, falling back to one thread
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub chunk_size: u64,
    pub thread_count: usize,
    pub extent_mode: ExtentMode,
    pub fail_on_empty_domain: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            thread_count: default_thread_count(),
            extent_mode: ExtentMode::default(),
            fail_on_empty_domain: false,
        }
    }
}

impl EngineConfig {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn with_extent_mode(mut self, mode: ExtentMode) -> Self {
        self.extent_mode = mode;
        self
    }

    pub fn with_fail_on_empty_domain(mut self, fail: bool) -> Self {
        self.fail_on_empty_domain = fail;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.thread_count == 0 {
            return Err(EngineError::InvalidConfig(
                "thread_count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Set one option from its textual value
    pub fn apply(&mut self, name: &str, value: &str) -> EngineResult<()> {
        let spec = option(name)
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown option '{}'", name)))?;
        let invalid = || {
            EngineError::InvalidConfig(format!(
                "invalid value '{}' for {} (expected {})",
                value,
                spec.name,
                spec.kind.describe()
            ))
        };

        match spec.name {
            "chunk_size" => {
                self.chunk_size = value
                    .parse::<u64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(invalid)?;
            }
            "thread_count" => {
                self.thread_count = if value.eq_ignore_ascii_case("auto") {
                    default_thread_count()
                } else {
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(invalid)?
                };
            }
            "extent_mode" => {
                self.extent_mode = value.parse().map_err(|_| invalid())?;
            }
            "fail_on_empty_domain" => {
                self.fail_on_empty_domain = value.parse::<bool>().map_err(|_| invalid())?;
            }
            other => {
                return Err(EngineError::InvalidConfig(format!(
                    "option '{}' is declared but not handled",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Apply a sequence of `key=value` assignments in order
    pub fn apply_all<I, S>(&mut self, assignments: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for assignment in assignments {
            let (key, value) = parse_assignment(assignment.as_ref())?;
            self.apply(&key, &value)?;
        }
        Ok(())
    }
}
