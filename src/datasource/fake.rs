use crate::domain::{DynamicProperty, ManagedObjectRef, ObjectContent, RawValue, TelemetrySource};
use crate::error::RemoteQueryError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Recorded {
    pub created_views: Vec<ManagedObjectRef>,
    pub destroyed_views: Vec<ManagedObjectRef>,
    pub queries: Vec<(String, Vec<String>)>,
}

/// In-memory endpoint serving canned objects per managed-object type.
pub struct FakeSource {
    endpoint: String,
    objects: HashMap<String, Vec<ObjectContent>>,
    delay: Option<Duration>,
    fail_queries: bool,
    recorded: Mutex<Recorded>,
}

impl FakeSource {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            objects: HashMap::new(),
            delay: None,
            fail_queries: false,
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn with_object(mut self, kind: &str, id: &str, properties: Vec<(&str, RawValue)>) -> Self {
        let object = ObjectContent {
            obj: ManagedObjectRef::new(kind, id),
            properties: properties
                .into_iter()
                .map(|(name, value)| DynamicProperty::new(name, value))
                .collect(),
        };

        self.objects.entry(kind.to_owned()).or_default().push(object);
        self
    }

    /// Every property query sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn recorded<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        f(&self.recorded.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl TelemetrySource for FakeSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn create_container_view(
        &self,
        kinds: &[&str],
    ) -> Result<ManagedObjectRef, RemoteQueryError> {
        let mut recorded = self.recorded.lock().unwrap();
        let view = ManagedObjectRef::new(
            "ContainerView",
            format!("view-{}-{}", kinds.join("+"), recorded.created_views.len()),
        );

        recorded.created_views.push(view.clone());
        Ok(view)
    }

    async fn destroy_view(&self, view: &ManagedObjectRef) -> Result<(), RemoteQueryError> {
        self.recorded
            .lock()
            .unwrap()
            .destroyed_views
            .push(view.clone());
        Ok(())
    }

    async fn retrieve_properties(
        &self,
        view: &ManagedObjectRef,
        kind: &str,
        paths: &[String],
    ) -> Result<Vec<ObjectContent>, RemoteQueryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut recorded = self.recorded.lock().unwrap();
            if !recorded.created_views.contains(view) || recorded.destroyed_views.contains(view) {
                return Err(RemoteQueryError::Api {
                    status: 500,
                    body: format!("ManagedObjectNotFound: {}", view),
                });
            }

            recorded.queries.push((kind.to_owned(), paths.to_vec()));
        }

        if self.fail_queries {
            return Err(RemoteQueryError::Api {
                status: 503,
                body: "service unavailable".to_owned(),
            });
        }

        let objects = self
            .objects
            .get(kind)
            .map(|objects| {
                objects
                    .iter()
                    .map(|o| ObjectContent {
                        obj: o.obj.clone(),
                        properties: o
                            .properties
                            .iter()
                            .filter(|p| paths.contains(&p.name))
                            .cloned()
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(objects)
    }
}
