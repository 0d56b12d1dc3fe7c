use std::{collections::BTreeMap, sync::Arc};

use super::{ComputeEngine, CpuEngine, EngineParser, EngineRef, GpuEngine};
use crate::error::ConfigError;

/// Name to engine lookup used to resolve engine strings.
///
/// [Default] registers [CpuEngine] and [GpuEngine]. Registering an engine
/// under an existing name replaces it.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<String, EngineRef>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CpuEngine);
        registry.register(GpuEngine);
        registry
    }
}

impl EngineRegistry {
    pub fn empty() -> Self {
        Self {
            engines: BTreeMap::new(),
        }
    }

    pub fn register<T: ComputeEngine + 'static>(&mut self, engine: T) -> &mut Self {
        self.register_shared(Arc::new(engine))
    }

    pub fn register_shared(&mut self, engine: EngineRef) -> &mut Self {
        let name = engine.name().to_ascii_uppercase();
        tracing::debug!(engine = %name, "registering compute engine");
        self.engines.insert(name, engine);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EngineRef> {
        self.engines.get(&name.to_ascii_uppercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Looks up every sub-engine of a parsed engine string, in order.
    pub fn resolve(&self, parsed: &EngineParser) -> Result<Vec<EngineRef>, ConfigError> {
        parsed
            .subengines()
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownSubEngine(name.clone()))
            })
            .collect()
    }
}
