// Resolved component instances

use crate::logging::{debug, trace};
use crate::Error;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A constructed component, shared by every injection point and route.
pub type Instance = Arc<dyn Any + Send + Sync>;

fn downcast<T: Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.clone().downcast::<T>().ok()
}

/// Dependencies handed to [`Component::construct`](crate::Component::construct),
/// keyed by injection field name.
pub struct Injected {
    component: String,
    fields: HashMap<String, (String, Instance)>,
}

impl Injected {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            fields: HashMap::new(),
        }
    }

    /// Provide `instance` (registered as `target`) for `field`.
    pub fn insert(&mut self, field: impl Into<String>, target: impl Into<String>, instance: Instance) {
        self.fields.insert(field.into(), (target.into(), instance));
    }

    /// Borrow the dependency injected into `field` as a `T`.
    pub fn get<T: Send + Sync + 'static>(&self, field: &str) -> Result<Arc<T>, Error> {
        let (target, instance) = self.fields.get(field).ok_or_else(|| {
            Error::DependencyInjection(format!(
                "{} has no injection for field '{}'",
                self.component, field
            ))
        })?;
        downcast::<T>(instance).ok_or_else(|| {
            Error::DependencyInjection(format!(
                "{}::{} expects {} but '{}' is a different type",
                self.component,
                field,
                std::any::type_name::<T>(),
                target
            ))
        })
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Every component instance after resolution, by name and by type.
#[derive(Clone, Default)]
pub struct Container {
    by_name: Arc<HashMap<String, Instance>>,
    by_type: Arc<HashMap<TypeId, Instance>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new component container");
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, type_id: TypeId, instance: Instance) {
        Arc::make_mut(&mut self.by_name).insert(name.to_string(), instance.clone());
        Arc::make_mut(&mut self.by_type).insert(type_id, instance);
        trace!(component = name, "Instance stored in container");
    }

    /// Look up an instance by component name.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.by_name
            .get(name)
            .and_then(downcast::<T>)
            .ok_or_else(|| {
                Error::DependencyInjection(format!(
                    "component '{}' of type {} not found",
                    name,
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Look up an instance by type.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(downcast::<T>)
            .ok_or_else(|| {
                Error::DependencyInjection(format!(
                    "component not found: {}",
                    std::any::type_name::<T>()
                ))
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer {
        from: &'static str,
    }

    #[test]
    fn test_injected_get() {
        let mut injected = Injected::new("UserController");
        injected.insert("mail", "mailer", Arc::new(Mailer { from: "noreply" }));

        let mailer = injected.get::<Mailer>("mail").unwrap();
        assert_eq!(mailer.from, "noreply");
        assert!(injected.has("mail"));
        assert_eq!(injected.len(), 1);
    }

    #[test]
    fn test_injected_errors() {
        let mut injected = Injected::new("UserController");
        injected.insert("mail", "mailer", Arc::new(Mailer { from: "x" }));

        let missing = injected.get::<Mailer>("db").err().unwrap();
        assert!(missing.to_string().contains("'db'"));

        let wrong = injected.get::<String>("mail").err().unwrap();
        assert!(wrong.to_string().contains("'mailer'"));
    }

    #[test]
    fn test_container_lookup() {
        let mut container = Container::new();
        let instance: Instance = Arc::new(Mailer { from: "ops" });
        container.insert("mailer", TypeId::of::<Mailer>(), instance);

        let clone = container.clone();
        assert_eq!(clone.get::<Mailer>("mailer").unwrap().from, "ops");
        assert_eq!(clone.resolve::<Mailer>().unwrap().from, "ops");
        assert!(clone.get::<String>("mailer").is_err());
        assert!(clone.resolve::<String>().is_err());
        assert!(clone.has("mailer"));
        assert_eq!(clone.names().collect::<Vec<_>>(), vec!["mailer"]);
    }
}
