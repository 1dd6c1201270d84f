// Core traits for Trellis components

use crate::container::Injected;
use crate::metadata::DescriptorHandle;
use crate::Error;
use async_trait::async_trait;

/// A type the registry can describe and construct.
///
/// `describe` records role, name, injections and routes in the metadata
/// store. It may run more than once; every edit it makes is idempotent.
/// `construct` receives the already-resolved dependencies keyed by the
/// field names passed to [`DescriptorHandle::inject`].
///
/// ```
/// use std::sync::Arc;
/// use trellis_core::{Args, Component, DescriptorHandle, Error, Injected};
///
/// struct Greeter;
///
/// impl Component for Greeter {
///     fn describe(meta: &mut DescriptorHandle<'_, Self>) {
///         meta.controller("/hello");
///         meta.route("greet")
///             .get("/:name")
///             .bind(0, trellis_core::Binding::param("name"))
///             .handler(|_this: Arc<Self>, args: Args| async move {
///                 Ok(format!("hello {}", args.text(0).unwrap_or("stranger")))
///             });
///     }
///
///     fn construct(_deps: &Injected) -> Result<Self, Error> {
///         Ok(Greeter)
///     }
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    fn describe(meta: &mut DescriptorHandle<'_, Self>);

    fn construct(deps: &Injected) -> Result<Self, Error>;
}

/// A component other components depend on. `init` is awaited once, after
/// construction and before anything that injects this service is built.
#[async_trait]
pub trait Service: Component {
    async fn init(&self) -> Result<(), Error> {
        Ok(())
    }
}
