use super::normalizers::{HatEvalMapper, HateXplainMapper, HhRlhfMapper, RealToxicityMapper};
use super::SourceMapper;

/// Ordered set of source mappers; rows are emitted in registration order
pub struct MapperRegistry {
    mappers: Vec<Box<dyn SourceMapper>>,
}

impl MapperRegistry {
    pub fn empty() -> Self {
        Self { mappers: Vec::new() }
    }

    /// HateXplain, HatEval, HH-RLHF, RealToxicityPrompts
    pub fn standard(force_hateval_fallback: bool) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(HateXplainMapper::new()));
        registry.register(Box::new(HatEvalMapper::new(force_hateval_fallback)));
        registry.register(Box::new(HhRlhfMapper::new()));
        registry.register(Box::new(RealToxicityMapper::new()));
        registry
    }

    /// Append a mapper, replacing any earlier one with the same source id in place
    pub fn register(&mut self, mapper: Box<dyn SourceMapper>) {
        match self
            .mappers
            .iter()
            .position(|m| m.source_id() == mapper.source_id())
        {
            Some(i) => self.mappers[i] = mapper,
            None => self.mappers.push(mapper),
        }
    }

    pub fn get_mapper(&self, source_id: &str) -> Option<&dyn SourceMapper> {
        self.mappers
            .iter()
            .find(|m| m.source_id() == source_id)
            .map(|m| m.as_ref())
    }

    pub fn mappers(&self) -> impl Iterator<Item = &dyn SourceMapper> {
        self.mappers.iter().map(|m| m.as_ref())
    }

    /// Registered source ids, in emission order
    pub fn list_sources(&self) -> Vec<&str> {
        self.mappers.iter().map(|m| m.source_id()).collect()
    }
}
