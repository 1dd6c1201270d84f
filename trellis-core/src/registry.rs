// Component registration and dependency resolution

use crate::compiler::{compile, CompiledRoute};
use crate::container::{Container, Injected, Instance};
use crate::discovery;
use crate::dispatcher::Dispatcher;
use crate::logging::{debug, info, warn};
use crate::metadata::{MetadataStore, Role};
use crate::plugin::{PluginChain, RequestPlugin};
use crate::traits::Component;
use crate::{ConfigurationError, Error};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Collects component types and resolves them into instances, routes and
/// plugins.
///
/// Registration runs each type's [`Component::describe`] and checks names.
/// [`resolve_all`](Self::resolve_all) first plans the construction order
/// (reporting cycles and unknown targets before anything is built), then
/// constructs every component exactly once, dependencies first.
pub struct Registry {
    store: MetadataStore,
    order: Vec<TypeId>,
    names: HashMap<String, TypeId>,
    route_prefix: String,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            store: MetadataStore::new(),
            order: Vec::new(),
            names: HashMap::new(),
            route_prefix: "/".to_string(),
        }
    }

    /// Prefix prepended to every controller route.
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    pub fn set_route_prefix(&mut self, prefix: impl Into<String>) {
        self.route_prefix = prefix.into();
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Register a component type. Fails when the type declares no role or
    /// its name is already taken.
    pub fn register<T: Component>(&mut self) -> Result<&mut Self, Error> {
        let mut handle = self.store.get_or_create::<T>();
        T::describe(&mut handle);
        let descriptor = handle.descriptor();

        if descriptor.role() == Role::Unset {
            return Err(ConfigurationError::UnsetRole {
                type_name: descriptor.type_name().to_string(),
            }
            .into());
        }
        if self.names.contains_key(descriptor.name()) {
            return Err(ConfigurationError::DuplicateComponent {
                name: descriptor.name().to_string(),
            }
            .into());
        }
        if descriptor.role() != Role::Controller && !descriptor.routes().is_empty() {
            warn!(
                component = descriptor.name(),
                role = %descriptor.role(),
                "Routes declared on a non-controller are ignored"
            );
        }

        debug!(
            component = descriptor.name(),
            role = %descriptor.role(),
            injections = descriptor.injections().len(),
            "Component registered"
        );
        self.names
            .insert(descriptor.name().to_string(), TypeId::of::<T>());
        self.order.push(TypeId::of::<T>());
        Ok(self)
    }

    /// Register every component announced with [`discover!`](crate::discover),
    /// in type-path order.
    pub fn scan(&mut self) -> Result<&mut Self, Error> {
        for registration in discovery::discovered() {
            debug!(component = (registration.type_name)(), "Registering discovered component");
            (registration.register)(self)?;
        }
        Ok(self)
    }

    /// Construction order: every dependency precedes its dependents, and
    /// otherwise registration order is kept.
    pub fn plan(&self) -> Result<Vec<TypeId>, ConfigurationError> {
        let mut done = HashSet::new();
        let mut chain = Vec::new();
        let mut order = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            self.visit(id, &mut chain, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: TypeId,
        chain: &mut Vec<TypeId>,
        done: &mut HashSet<TypeId>,
        order: &mut Vec<TypeId>,
    ) -> Result<(), ConfigurationError> {
        if done.contains(&id) {
            return Ok(());
        }
        let Some(descriptor) = self.store.get(&id) else {
            return Ok(());
        };

        if let Some(start) = chain.iter().position(|in_progress| *in_progress == id) {
            let mut names: Vec<String> = chain[start..]
                .iter()
                .filter_map(|c| self.store.get(c))
                .map(|d| d.name().to_string())
                .collect();
            names.push(descriptor.name().to_string());
            return Err(ConfigurationError::CyclicDependency { chain: names });
        }

        chain.push(id);
        for injection in descriptor.injections() {
            let Some(&target) = self.names.get(&injection.target_name) else {
                return Err(ConfigurationError::MissingComponent {
                    target: injection.target_name.clone(),
                    requester: descriptor.name().to_string(),
                    field: injection.field_name.clone(),
                });
            };
            self.visit(target, chain, done, order)?;
        }
        chain.pop();

        done.insert(id);
        order.push(id);
        Ok(())
    }

    /// Construct every component. Services have `init` awaited, controllers
    /// have their routes compiled and plugins join the chain, each as soon
    /// as the component is built.
    pub async fn resolve_all(self) -> Result<Resolved, Error> {
        let order = self.plan()?;
        info!(components = order.len(), "Resolving components");

        let mut instances: HashMap<TypeId, Instance> = HashMap::with_capacity(order.len());
        let mut container = Container::new();
        let mut routes = Vec::new();
        let mut plugins: Vec<Arc<dyn RequestPlugin>> = Vec::new();

        for id in order {
            let Some(descriptor) = self.store.get(&id) else {
                continue;
            };

            let mut injected = Injected::new(descriptor.name());
            for injection in descriptor.injections() {
                let dependency = self
                    .names
                    .get(&injection.target_name)
                    .and_then(|target| instances.get(target))
                    .ok_or_else(|| ConfigurationError::MissingComponent {
                        target: injection.target_name.clone(),
                        requester: descriptor.name().to_string(),
                        field: injection.field_name.clone(),
                    })?;
                debug!(
                    component = descriptor.name(),
                    field = %injection.field_name,
                    target = %injection.target_name,
                    "Injecting dependency"
                );
                injected.insert(
                    injection.field_name.clone(),
                    injection.target_name.clone(),
                    dependency.clone(),
                );
            }

            let instance = (descriptor.factory)(&injected)?;

            match descriptor.role() {
                Role::Controller => {
                    routes.extend(compile(&instance, descriptor, &self.route_prefix)?);
                }
                Role::Plugin => {
                    if let Some(plugin) = descriptor.as_plugin.and_then(|cast| cast(instance.clone())) {
                        plugins.push(plugin);
                    }
                }
                Role::Service => {
                    if let Some(init) = descriptor.init {
                        init(instance.clone()).await?;
                    }
                }
                Role::Unset => {}
            }

            info!(component = descriptor.name(), role = %descriptor.role(), "Component ready");
            container.insert(descriptor.name(), id, instance.clone());
            instances.insert(id, instance);
        }

        Ok(Resolved {
            container,
            routes,
            plugins: PluginChain::new(plugins),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of [`Registry::resolve_all`].
pub struct Resolved {
    pub container: Container,
    pub routes: Vec<CompiledRoute>,
    pub plugins: PluginChain,
}

impl Resolved {
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(self.routes, self.plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DescriptorHandle, Service};
    use async_trait::async_trait;
    use std::sync::Mutex;

    static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    struct Db;

    impl Component for Db {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service();
        }

        fn construct(_deps: &Injected) -> Result<Self, Error> {
            LOG.lock().unwrap().push("db constructed");
            Ok(Db)
        }
    }

    #[async_trait]
    impl Service for Db {
        async fn init(&self) -> Result<(), Error> {
            LOG.lock().unwrap().push("db init");
            Ok(())
        }
    }

    struct Repo {
        db: Arc<Db>,
    }

    impl Component for Repo {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service().inject("db");
        }

        fn construct(deps: &Injected) -> Result<Self, Error> {
            LOG.lock().unwrap().push("repo constructed");
            Ok(Repo { db: deps.get("db")? })
        }
    }

    impl Service for Repo {}

    #[tokio::test]
    async fn test_dependency_built_and_initialized_first() {
        let mut registry = Registry::new();
        registry.register::<Repo>().unwrap().register::<Db>().unwrap();

        let resolved = registry.resolve_all().await.unwrap();
        let log = LOG.lock().unwrap().clone();
        let db = log.iter().position(|e| *e == "db init").unwrap();
        let repo = log.iter().position(|e| *e == "repo constructed").unwrap();
        assert!(db < repo);

        let repo = resolved.container.get::<Repo>("repo").unwrap();
        let db = resolved.container.get::<Db>("db").unwrap();
        assert!(Arc::ptr_eq(&repo.db, &db));
    }

    struct A;
    struct B;

    impl Component for A {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service().name("a").inject_as("other", "b");
        }
        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(A)
        }
    }
    impl Service for A {}

    impl Component for B {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service().name("b").inject_as("other", "a");
        }
        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(B)
        }
    }
    impl Service for B {}

    #[test]
    fn test_cycle_names_both_components() {
        let mut registry = Registry::new();
        registry.register::<A>().unwrap().register::<B>().unwrap();
        let err = registry.plan().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CyclicDependency {
                chain: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    struct Lonely;

    impl Component for Lonely {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service().inject_as("mail", "mailer");
        }
        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(Lonely)
        }
    }
    impl Service for Lonely {}

    #[tokio::test]
    async fn test_missing_target() {
        let mut registry = Registry::new();
        registry.register::<Lonely>().unwrap();
        let err = registry.resolve_all().await.err().unwrap();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MissingComponent { ref target, ref requester, ref field })
                if target == "mailer" && requester == "lonely" && field == "mail"
        ));
    }

    struct Nameless;

    impl Component for Nameless {
        fn describe(_meta: &mut DescriptorHandle<'_, Self>) {}
        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(Nameless)
        }
    }

    struct DbAgain;

    impl Component for DbAgain {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.service().name("db");
        }
        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(DbAgain)
        }
    }
    impl Service for DbAgain {}

    #[test]
    fn test_registration_errors() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register::<Nameless>(),
            Err(Error::Configuration(ConfigurationError::UnsetRole { .. }))
        ));

        registry.register::<Db>().unwrap();
        assert!(matches!(
            registry.register::<DbAgain>(),
            Err(Error::Configuration(ConfigurationError::DuplicateComponent { ref name })) if name == "db"
        ));
        assert!(registry.register::<Db>().is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_plan_keeps_registration_order_for_independent_components() {
        let mut registry = Registry::new();
        registry.register::<Lonely>().unwrap();
        registry.register::<Db>().unwrap();
        registry.register::<Repo>().unwrap();

        // Lonely's target is missing, so plan a registry without it instead.
        assert!(registry.plan().is_err());

        let mut registry = Registry::new();
        registry.register::<Db>().unwrap().register::<Repo>().unwrap();
        let order = registry.plan().unwrap();
        assert_eq!(order, vec![TypeId::of::<Db>(), TypeId::of::<Repo>()]);
    }
}
