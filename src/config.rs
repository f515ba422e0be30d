#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use wasmlink_engine::Settings;

/// Possible optimization levels for compiled wasm code.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OptLevel {
    /// No optimizations performed, minimizes compilation time.
    None,
    /// Generates the fastest possible code, but may take longer.
    #[default]
    Speed,
    /// Similar to `Speed`, but also performs transformations aimed at
    /// reducing code size.
    SpeedAndSize,
}

impl From<OptLevel> for wasmlink_engine::OptLevel {
    fn from(level: OptLevel) -> wasmlink_engine::OptLevel {
        match level {
            OptLevel::None => wasmlink_engine::OptLevel::None,
            OptLevel::Speed => wasmlink_engine::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmlink_engine::OptLevel::SpeedAndSize,
        }
    }
}

/// Global configuration options used to create an
/// [`Environment`](crate::Environment).
///
/// Options are set with builder-style methods:
///
/// ```ignore
/// let mut config = Config::new();
/// config.opt_level(OptLevel::None).debug_info(true);
/// let env = Environment::with_config(&config)?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    opt_level: OptLevel,
    bulk_memory: bool,
    multi_value: bool,
    debug_info: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

impl Config {
    /// Creates a new configuration with the default settings: optimizing for
    /// speed, with the bulk memory and multi-value proposals enabled and no
    /// debug information.
    pub fn new() -> Config {
        Config {
            opt_level: OptLevel::Speed,
            bulk_memory: true,
            multi_value: true,
            debug_info: false,
        }
    }

    /// Configures the optimization level of compiled code.
    ///
    /// The default is [`OptLevel::Speed`].
    pub fn opt_level(&mut self, level: OptLevel) -> &mut Self {
        self.opt_level = level;
        self
    }

    /// Configures whether the [bulk memory proposal] is enabled.
    ///
    /// Disabling it also disables reference types, which depend on it.
    ///
    /// [bulk memory proposal]: https://github.com/webassembly/bulk-memory-operations
    pub fn wasm_bulk_memory(&mut self, enable: bool) -> &mut Self {
        self.bulk_memory = enable;
        self
    }

    /// Configures whether the [multi-value proposal] is enabled.
    ///
    /// Functions with more than one result can still only be called without
    /// reading their results.
    ///
    /// [multi-value proposal]: https://github.com/webassembly/multi-value
    pub fn wasm_multi_value(&mut self, enable: bool) -> &mut Self {
        self.multi_value = enable;
        self
    }

    /// Configures whether DWARF debug information is emitted for compiled
    /// code.
    pub fn debug_info(&mut self, enable: bool) -> &mut Self {
        self.debug_info = enable;
        self
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings {
            opt_level: self.opt_level.into(),
            bulk_memory: self.bulk_memory,
            multi_value: self.multi_value,
            debug_info: self.debug_info,
        }
    }
}
