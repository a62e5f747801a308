use crate::collector::Plugin;
use crate::error::{ExporterError, Result};

pub type PluginFactory = Box<dyn Fn() -> Result<Box<dyn Plugin>> + Send + Sync>;

/// Named plugin factories, in registration order. Built once at process
/// initialization and handed to the collection service.
#[derive(Default)]
pub struct CollectorRegistry {
    factories: Vec<(String, PluginFactory)>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, name: &str, factory: F) -> Result<&mut Self>
    where
        F: Fn() -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        if self.contains(name) {
            return Err(ExporterError::DuplicateCollectorRegistration(
                name.to_owned(),
            ));
        }

        self.factories.push((name.to_owned(), Box::new(factory)));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(n, _)| n.as_str())
    }

    /// Instantiates one plugin per requested name, in request order. Naming
    /// a plugin twice yields two instances.
    pub fn load<S>(&self, names: &[S]) -> Result<Vec<Box<dyn Plugin>>>
    where
        S: AsRef<str>,
    {
        let mut plugins = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            let Some((_, factory)) = self.factories.iter().find(|(n, _)| n == name) else {
                return Err(ExporterError::UnknownCollector(name.to_owned()));
            };

            plugins.push(factory()?);
        }

        Ok(plugins)
    }
}
