use crate::error::ConfigError;

/// The only engine family able to run these layers.
pub const ENGINE_FAMILY: &str = "MKLDNN";

/// What an empty engine string, or the bare family name, expands to.
pub const DEFAULT_ENGINE: &str = "MKLDNN:CPU";

/// A parsed engine string of the form `FAMILY[:SUB[,SUB]...]`.
///
/// Sub-engine names are upper-cased and kept in the order written, which is
/// the order they are tried in.
///
/// ```rust
/// # use dnnpool_core::engine::EngineParser;
/// let p: EngineParser = "mkldnn:gpu,cpu".parse().unwrap();
/// assert_eq!(p.subengines(), ["GPU", "CPU"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParser {
    family: String,
    subengines: Vec<String>,
}

impl EngineParser {
    pub fn parse(engine: &str) -> Result<Self, ConfigError> {
        let trimmed = engine.trim();
        let full = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ENGINE_FAMILY) {
            DEFAULT_ENGINE
        } else {
            trimmed
        };

        let (family, list) = full
            .split_once(':')
            .ok_or_else(|| ConfigError::UnsupportedEngineFamily(full.to_string()))?;
        let family = family.trim().to_ascii_uppercase();
        if family != ENGINE_FAMILY {
            return Err(ConfigError::UnsupportedEngineFamily(family));
        }

        let subengines = list
            .split([',', ':'])
            .map(|s| match s.trim() {
                "" => Err(ConfigError::MalformedEngine(engine.to_string())),
                s => Ok(s.to_ascii_uppercase()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { family, subengines })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn subengines(&self) -> &[String] {
        &self.subengines
    }

    pub fn len(&self) -> usize {
        self.subengines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subengines.is_empty()
    }
}

impl std::str::FromStr for EngineParser {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
