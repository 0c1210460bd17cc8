use std::sync::Arc;

use dashmap::DashMap;

use crate::calendar::ExternalCalendarProvider;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::limits::*;
use crate::model::LessonPlan;
use crate::notify::NotifyHub;

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    InvalidName(&'static str),
    TooManySchools,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidName(msg) => write!(f, "invalid school name: {msg}"),
            RegistryError::TooManySchools => write!(f, "too many schools"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Manages per-school engines. Each school (tenant) gets its own engine over
/// isolated in-memory stores plus its own notification hub; the external
/// calendar provider, plan catalog and config template are shared.
pub struct SchoolRegistry {
    engines: DashMap<String, Arc<Engine>>,
    hubs: DashMap<String, Arc<NotifyHub>>,
    calendar: Arc<dyn ExternalCalendarProvider>,
    plans: Vec<LessonPlan>,
    config: EngineConfig,
}

impl SchoolRegistry {
    pub fn new(
        calendar: Arc<dyn ExternalCalendarProvider>,
        plans: Vec<LessonPlan>,
        config: EngineConfig,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            hubs: DashMap::new(),
            calendar,
            plans,
            config,
        }
    }

    /// Get or lazily create the engine for the given school.
    pub fn get_or_create(&self, school: &str) -> Result<Arc<Engine>, RegistryError> {
        if let Some(engine) = self.engines.get(school) {
            return Ok(engine.value().clone());
        }
        if school.len() > MAX_SCHOOL_NAME_LEN {
            return Err(RegistryError::InvalidName("school name too long"));
        }
        let well_formed = !school.is_empty()
            && school
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        if !well_formed {
            return Err(RegistryError::InvalidName(
                "school names are alphanumeric plus '_' and '-'",
            ));
        }
        if self.engines.len() >= MAX_SCHOOLS {
            return Err(RegistryError::TooManySchools);
        }

        let hub = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::in_memory(
            self.calendar.clone(),
            hub.clone(),
            self.plans.clone(),
            self.config.clone(),
        ));
        self.engines.insert(school.to_string(), engine.clone());
        self.hubs.insert(school.to_string(), hub);
        metrics::gauge!(crate::observability::SCHOOLS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    /// The school's notification hub, for job runners that deliver intents.
    pub fn hub(&self, school: &str) -> Option<Arc<NotifyHub>> {
        self.hubs.get(school).map(|e| e.value().clone())
    }

    pub fn school_count(&self) -> usize {
        self.engines.len()
    }
}
