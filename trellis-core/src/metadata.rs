//! Component metadata
//!
//! The [`MetadataStore`] keeps one [`ComponentDescriptor`] per component
//! type. Descriptors are created on first access and edited in place through
//! a typed [`DescriptorHandle`], which is what [`Component::describe`]
//! receives. Nothing is ever removed.

use crate::binding::{Args, Binding};
use crate::container::{Injected, Instance};
use crate::logging::trace;
use crate::plugin::RequestPlugin;
use crate::reply::Reply;
use crate::traits::{Component, Service};
use crate::{ConfigurationError, Error, HttpMethod};
use futures_util::future::{BoxFuture, FutureExt};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased handler method bound to an instance at call time.
pub type MethodFn =
    Arc<dyn Fn(Instance, Args) -> BoxFuture<'static, Result<Reply, Error>> + Send + Sync>;

pub(crate) type Factory = fn(&Injected) -> Result<Instance, Error>;
pub(crate) type InitHook = fn(Instance) -> BoxFuture<'static, Result<(), Error>>;
pub(crate) type PluginCast = fn(Instance) -> Option<Arc<dyn RequestPlugin>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Unset,
    Controller,
    Service,
    Plugin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unset => "unset",
            Role::Controller => "controller",
            Role::Service => "service",
            Role::Plugin => "plugin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to inject the component named `target_name` into `field_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub field_name: String,
    pub target_name: String,
}

/// Routing metadata for one handler method.
#[derive(Clone, Default)]
pub struct RouteDescriptor {
    method_name: String,
    http_method: HttpMethod,
    path_template: Option<String>,
    arity: Option<usize>,
    bindings: BTreeMap<usize, Binding>,
    handler: Option<MethodFn>,
}

impl RouteDescriptor {
    fn new(method_name: &str) -> Self {
        Self {
            method_name: method_name.to_string(),
            ..Self::default()
        }
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    /// Declared path, or `/<method_name>` when none was given.
    pub fn path(&self) -> String {
        self.path_template
            .clone()
            .unwrap_or_else(|| format!("/{}", self.method_name))
    }

    pub fn bindings(&self) -> &BTreeMap<usize, Binding> {
        &self.bindings
    }

    pub fn handler(&self) -> Option<&MethodFn> {
        self.handler.as_ref()
    }

    /// One slot per handler argument; undeclared slots are `None`.
    pub fn parameter_plan(&self) -> Result<Vec<Option<Binding>>, ConfigurationError> {
        let highest = self.bindings.keys().next_back().map(|i| i + 1).unwrap_or(0);
        let len = match self.arity {
            Some(arity) if highest > arity => {
                return Err(ConfigurationError::InvalidRoute {
                    route: self.method_name.clone(),
                    reason: format!(
                        "binding at index {} exceeds declared arity {}",
                        highest - 1,
                        arity
                    ),
                });
            }
            Some(arity) => arity,
            None => highest,
        };

        let mut plan = vec![None; len];
        for (index, binding) in &self.bindings {
            plan[*index] = Some(binding.clone());
        }
        Ok(plan)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method_name", &self.method_name)
            .field("http_method", &self.http_method)
            .field("path", &self.path())
            .field("arity", &self.arity)
            .field("bindings", &self.bindings)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Everything recorded about one component type.
pub struct ComponentDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    role: Role,
    name: String,
    route_prefix: String,
    injections: Vec<Injection>,
    routes: Vec<RouteDescriptor>,
    pub(crate) factory: Factory,
    pub(crate) init: Option<InitHook>,
    pub(crate) as_plugin: Option<PluginCast>,
}

impl ComponentDescriptor {
    fn new<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            role: Role::Unset,
            name: String::new(),
            route_prefix: String::new(),
            injections: Vec::new(),
            routes: Vec::new(),
            factory: construct::<T>,
            init: None,
            as_plugin: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type path, e.g. `my_app::users::UserController`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    pub fn injections(&self) -> &[Injection] {
        &self.injections
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("route_prefix", &self.route_prefix)
            .field("injections", &self.injections)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

fn construct<T: Component>(deps: &Injected) -> Result<Instance, Error> {
    Ok(Arc::new(T::construct(deps)?))
}

fn init_service<T: Service>(instance: Instance) -> BoxFuture<'static, Result<(), Error>> {
    async move {
        let service = instance.downcast::<T>().map_err(|_| {
            Error::Internal(format!("instance is not a {}", std::any::type_name::<T>()))
        })?;
        service.init().await
    }
    .boxed()
}

fn cast_plugin<T: Component + RequestPlugin>(instance: Instance) -> Option<Arc<dyn RequestPlugin>> {
    instance
        .downcast::<T>()
        .ok()
        .map(|plugin| plugin as Arc<dyn RequestPlugin>)
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Descriptor registry keyed by component type.
#[derive(Debug, Default)]
pub struct MetadataStore {
    descriptors: HashMap<TypeId, ComponentDescriptor>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `T`, created with defaults on first access. Repeated
    /// calls edit the same descriptor.
    pub fn get_or_create<T: Component>(&mut self) -> DescriptorHandle<'_, T> {
        let descriptor = self
            .descriptors
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                trace!(component = std::any::type_name::<T>(), "Creating descriptor");
                ComponentDescriptor::new::<T>()
            });
        DescriptorHandle {
            descriptor,
            _marker: PhantomData,
        }
    }

    pub fn get(&self, type_id: &TypeId) -> Option<&ComponentDescriptor> {
        self.descriptors.get(type_id)
    }

    pub fn get_of<T: 'static>(&self) -> Option<&ComponentDescriptor> {
        self.get(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Typed editing access to the descriptor of `T`.
pub struct DescriptorHandle<'a, T> {
    descriptor: &'a mut ComponentDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Component> DescriptorHandle<'a, T> {
    pub fn descriptor(&self) -> &ComponentDescriptor {
        self.descriptor
    }

    fn default_name(&mut self, name: String) {
        if self.descriptor.name.is_empty() {
            self.descriptor.name = name;
        }
    }

    /// Mark `T` as a controller whose routes live under `prefix`.
    pub fn controller(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.descriptor.role = Role::Controller;
        self.descriptor.route_prefix = prefix.into();
        self.default_name(short_type_name(self.descriptor.type_name).to_string());
        self
    }

    /// Override the registry name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.descriptor.name = name.into();
        self
    }

    /// Inject the component named `field` into `field`.
    pub fn inject(&mut self, field: impl Into<String>) -> &mut Self {
        let field = field.into();
        self.inject_as(field.clone(), field)
    }

    /// Inject the component named `target` into `field`. Injecting the same
    /// field again replaces the target.
    pub fn inject_as(&mut self, field: impl Into<String>, target: impl Into<String>) -> &mut Self {
        let field_name = field.into();
        let target_name = target.into();
        match self
            .descriptor
            .injections
            .iter_mut()
            .find(|i| i.field_name == field_name)
        {
            Some(existing) => existing.target_name = target_name,
            None => self.descriptor.injections.push(Injection {
                field_name,
                target_name,
            }),
        }
        self
    }

    /// Edit the route for `method_name`, creating it (GET, `/<method_name>`)
    /// if it does not exist yet.
    pub fn route(&mut self, method_name: &str) -> RouteEditor<'_, T> {
        let routes = &mut self.descriptor.routes;
        let index = match routes.iter().position(|r| r.method_name == method_name) {
            Some(index) => index,
            None => {
                routes.push(RouteDescriptor::new(method_name));
                routes.len() - 1
            }
        };
        RouteEditor {
            route: &mut routes[index],
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Service> DescriptorHandle<'a, T> {
    /// Mark `T` as a service; its [`Service::init`] runs after construction.
    pub fn service(&mut self) -> &mut Self {
        self.descriptor.role = Role::Service;
        self.descriptor.init = Some(init_service::<T>);
        self.default_name(lower_first(short_type_name(self.descriptor.type_name)));
        self
    }
}

impl<'a, T: Component + RequestPlugin> DescriptorHandle<'a, T> {
    /// Mark `T` as a request plugin.
    pub fn plugin(&mut self) -> &mut Self {
        self.descriptor.role = Role::Plugin;
        self.descriptor.as_plugin = Some(cast_plugin::<T>);
        self.default_name(short_type_name(self.descriptor.type_name).to_string());
        self
    }
}

/// Chained edits to one [`RouteDescriptor`]. Later edits overwrite earlier
/// ones.
pub struct RouteEditor<'a, T> {
    route: &'a mut RouteDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Component> RouteEditor<'a, T> {
    pub fn method(self, method: HttpMethod) -> Self {
        self.route.http_method = method;
        self
    }

    /// Set the path template; a missing leading `/` is added.
    pub fn path(self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.route.path_template = Some(if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        });
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.method(HttpMethod::GET).path(path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.method(HttpMethod::POST).path(path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.method(HttpMethod::PUT).path(path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.method(HttpMethod::DELETE).path(path)
    }

    /// Declare the number of handler arguments.
    pub fn arity(self, arity: usize) -> Self {
        self.route.arity = Some(arity);
        self
    }

    /// Bind argument `index`.
    pub fn bind(self, index: usize, binding: Binding) -> Self {
        self.route.bindings.insert(index, binding);
        self
    }

    /// Set the handler. It receives the component instance and the bound
    /// arguments; its result is converted with [`Into<Reply>`].
    pub fn handler<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Arc<T>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: Into<Reply> + 'static,
    {
        let method: MethodFn = Arc::new(
            move |instance: Instance, args: Args| -> BoxFuture<'static, Result<Reply, Error>> {
                match instance.downcast::<T>() {
                    Ok(this) => handler(this, args).map(|r| r.map(Into::into)).boxed(),
                    Err(_) => futures_util::future::ready(Err(Error::Internal(format!(
                        "instance is not a {}",
                        std::any::type_name::<T>()
                    ))))
                    .boxed(),
                }
            },
        );
        self.route.handler = Some(method);
        self
    }
}
