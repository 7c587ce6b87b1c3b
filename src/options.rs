use log::{LevelFilter, warn};

pub const DECOMPILE_GENERIC_SIGNATURES: &str = "dgs";
pub const LOG_LEVEL: &str = "log";
pub const SKIP_MULTI_RELEASE_OVERLAYS: &str = "mro";

/// Switches read while building the structural model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompilerOptions {
    pub decompile_generic_signatures: bool,
    pub log_level: LevelFilter,
    pub skip_multi_release_overlays: bool,
}

impl Default for DecompilerOptions {
    fn default() -> Self {
        Self {
            decompile_generic_signatures: false,
            log_level: LevelFilter::Info,
            skip_multi_release_overlays: true,
        }
    }
}

impl DecompilerOptions {
    /// Builds options from `(key, value)` pairs over the defaults.
    ///
    /// Unknown keys and unparseable values are logged and ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.set(key, value);
        }
        options
    }

    /// Parses a single `key=value` argument.
    pub fn parse_pair(argument: &str) -> Option<(&str, &str)> {
        let (key, value) = argument.split_once('=')?;
        Some((key.trim(), value.trim()))
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            DECOMPILE_GENERIC_SIGNATURES => {
                if let Some(flag) = parse_flag(key, value) {
                    self.decompile_generic_signatures = flag;
                }
            }
            SKIP_MULTI_RELEASE_OVERLAYS => {
                if let Some(flag) = parse_flag(key, value) {
                    self.skip_multi_release_overlays = flag;
                }
            }
            LOG_LEVEL => match value.parse::<LevelFilter>() {
                Ok(level) => self.log_level = level,
                Err(_) => warn!("invalid log level '{value}'"),
            },
            _ => warn!("unknown option '{key}'"),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => {
            warn!("invalid value '{value}' for option '{key}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = DecompilerOptions::default();
        assert!(!options.decompile_generic_signatures);
        assert!(options.skip_multi_release_overlays);
        assert_eq!(options.log_level, LevelFilter::Info);
    }

    #[test]
    fn pairs_override_defaults_and_ignore_unknown_keys() {
        let options = DecompilerOptions::from_pairs([
            ("dgs", "1"),
            ("mro", "false"),
            ("log", "WARN"),
            ("ren", "1"),
            ("dgs", "maybe"),
        ]);
        assert!(options.decompile_generic_signatures);
        assert!(!options.skip_multi_release_overlays);
        assert_eq!(options.log_level, LevelFilter::Warn);
    }

    #[test]
    fn parses_key_value_argument() {
        assert_eq!(DecompilerOptions::parse_pair("dgs=1"), Some(("dgs", "1")));
        assert_eq!(DecompilerOptions::parse_pair("dgs"), None);
    }
}
