//! Emulator configuration model

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Log verbosity, mapped onto `tracing` levels by `logging::init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Address-space layout knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Main RAM size in bytes.
    pub ram_size: u64,
    /// Framebuffer base address in the guest address space.
    pub framebuffer_base: u64,
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: 512 * 1024 * 1024,
            framebuffer_base: 0xC000_0000,
            framebuffer_width: 640,
            framebuffer_height: 480,
        }
    }
}

/// CPU reset parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Base of the exception vector table.
    pub vector_base: u32,
    /// Entry point used when the image does not provide one.
    pub entry_point: u32,
    /// Initial stack pointer installed in r1.
    pub stack_pointer: u32,
    /// Stop the run loop after this many steps; 0 means unbounded.
    pub step_limit: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            vector_base: 0,
            entry_point: 0,
            stack_pointer: 0x0001_0000,
            step_limit: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
    /// Dump the full register file when the CPU halts.
    pub dump_on_halt: bool,
}

/// Top-level emulator configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub memory: MemoryConfig,
    pub cpu: CpuConfig,
    pub debug: DebugConfig,
}

impl Config {
    /// Load a configuration file, falling back to defaults for missing keys.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = Config::default();
        assert_eq!(config.memory.ram_size, 512 * 1024 * 1024);
        assert_eq!(config.cpu.stack_pointer, 0x0001_0000);
        assert_eq!(config.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [cpu]
            entry_point = 0x100
            stack_pointer = 0x20000

            [debug]
            log_level = "trace"
            "#,
        )
        .unwrap();
        assert_eq!(config.cpu.entry_point, 0x100);
        assert_eq!(config.cpu.stack_pointer, 0x20000);
        assert_eq!(config.debug.log_level, LogLevel::Trace);
        assert_eq!(config.memory.framebuffer_width, 640);
    }
}
