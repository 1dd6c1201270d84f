// Route compilation for controller instances

use crate::binding::{Arg, Args, Binding};
use crate::container::Instance;
use crate::context::RequestContext;
use crate::logging::{debug, info};
use crate::metadata::{ComponentDescriptor, MethodFn};
use crate::path::{join_paths, PathParams, PathPattern};
use crate::reply::Reply;
use crate::{ConfigurationError, Error, HttpMethod};
use std::fmt;
use std::sync::Arc;

/// A route bound to its controller instance. Immutable after startup.
#[derive(Clone)]
pub struct CompiledRoute {
    component: Arc<str>,
    method_name: Arc<str>,
    http_method: HttpMethod,
    pattern: PathPattern,
    plan: Arc<[Option<Binding>]>,
    instance: Instance,
    method: MethodFn,
}

impl CompiledRoute {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    /// Full path template including all prefixes.
    pub fn path(&self) -> &str {
        self.pattern.template()
    }

    pub fn arity(&self) -> usize {
        self.plan.len()
    }

    pub fn matches(&self, method: HttpMethod, path: &str) -> Option<PathParams> {
        if method != self.http_method {
            return None;
        }
        self.pattern.matches(path)
    }

    /// Fill every slot of the parameter plan from the request.
    pub fn bind(&self, ctx: &RequestContext) -> Result<Args, Error> {
        self.plan
            .iter()
            .map(|slot| match slot {
                Some(binding) => binding.extract(ctx),
                None => Ok(Arg::Missing),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Args::new)
    }

    pub async fn invoke(&self, args: Args) -> Result<Reply, Error> {
        (self.method)(self.instance.clone(), args).await
    }

    /// Bind, invoke and write the reply into `ctx`. An empty reply leaves
    /// any response written earlier in place.
    pub async fn call(&self, mut ctx: RequestContext) -> Result<RequestContext, Error> {
        let args = self.bind(&ctx)?;
        debug!(
            component = %self.component,
            method = %self.method_name,
            args = args.len(),
            "Invoking handler"
        );
        let reply = self.invoke(args).await?;
        if let Some(response) = reply.into_response()? {
            ctx.respond(response);
        }
        Ok(ctx)
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("component", &self.component)
            .field("method_name", &self.method_name)
            .field("http_method", &self.http_method)
            .field("path", &self.path())
            .field("arity", &self.arity())
            .finish()
    }
}

/// Compile every route of a controller. Full path is `global_prefix`, then
/// the controller prefix, then the route path.
pub fn compile(
    instance: &Instance,
    descriptor: &ComponentDescriptor,
    global_prefix: &str,
) -> Result<Vec<CompiledRoute>, ConfigurationError> {
    let component: Arc<str> = Arc::from(descriptor.name());
    let mut compiled = Vec::with_capacity(descriptor.routes().len());

    for route in descriptor.routes() {
        let qualified = format!("{}::{}", descriptor.name(), route.method_name());
        let method = route
            .handler()
            .cloned()
            .ok_or_else(|| ConfigurationError::InvalidRoute {
                route: qualified.clone(),
                reason: "no handler".to_string(),
            })?;

        let plan = route.parameter_plan().map_err(|e| match e {
            ConfigurationError::InvalidRoute { reason, .. } => ConfigurationError::InvalidRoute {
                route: qualified.clone(),
                reason,
            },
            other => other,
        })?;

        // Joining would drop the slash and make the route match without it.
        let route_path = route.path();
        if route_path.len() > 1 && route_path.ends_with('/') {
            return Err(ConfigurationError::InvalidRoute {
                route: qualified,
                reason: format!("path '{}' ends with '/'", route_path),
            });
        }

        let full_path = join_paths(&[global_prefix, descriptor.route_prefix(), &route_path]);
        let pattern = PathPattern::compile(&full_path)?;

        info!(
            method = %route.http_method(),
            path = %full_path,
            handler = %qualified,
            "Mapped route"
        );

        compiled.push(CompiledRoute {
            component: component.clone(),
            method_name: Arc::from(route.method_name()),
            http_method: route.http_method(),
            pattern,
            plan: plan.into(),
            instance: instance.clone(),
            method,
        });
    }

    Ok(compiled)
}
