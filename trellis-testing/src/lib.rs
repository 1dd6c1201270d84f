//! Testing utilities for Trellis applications.
//!
//! - [`TestClient`] sends requests into a request pipeline in-process
//! - [`TestApp`] bootstraps registered components and hands out a client
//! - assertion helpers produce readable failure messages
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis_core::*;
//! use trellis_testing::*;
//!
//! struct HelloController;
//!
//! impl Component for HelloController {
//!     fn describe(meta: &mut DescriptorHandle<'_, Self>) {
//!         meta.controller("/hello");
//!         meta.route("greet")
//!             .get("/:name")
//!             .bind(0, Binding::param("name"))
//!             .handler(|_this: Arc<Self>, args: Args| async move {
//!                 Ok(format!("Hello, {}!", args.text(0).unwrap_or("world")))
//!             });
//!     }
//!
//!     fn construct(_deps: &Injected) -> Result<Self, Error> {
//!         Ok(HelloController)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let app = TestAppBuilder::new()
//!     .register::<HelloController>()?
//!     .build()
//!     .await?;
//!
//! let response = app.client().get("/hello/ada").await;
//! assert_status(&response, 200);
//! assert_eq!(response.body_string().as_deref(), Some("Hello, ada!"));
//! # Ok::<(), Error>(())
//! # });
//! ```

mod assertions;
mod test_app;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_client_error, assert_header, assert_json, assert_status,
    assert_success, assert_validation_error,
};
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
