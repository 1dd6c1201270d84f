// Test Application Builder

use crate::TestClient;
use std::sync::Arc;
use trellis_core::{AppConfig, Application, Component, Container, Error, Middleware};

/// A bootstrapped application with a client wired to it.
pub struct TestApp {
    pub container: Container,
    client: TestClient,
}

impl TestApp {
    /// Resolve `app` and wrap it for in-process requests.
    pub async fn bootstrap(app: Application) -> Result<Self, Error> {
        let server = app.bootstrap().await?;
        Ok(Self {
            container: server.container().clone(),
            client: TestClient::new(server.pipeline().clone()),
        })
    }

    /// Look up a component instance by its registered name.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.container.get(name)
    }

    pub fn client(&self) -> &TestClient {
        &self.client
    }
}

/// Builder for test applications. Static file serving is off by default.
pub struct TestAppBuilder {
    app: Application,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            app: Application::new(config.static_files(false)),
        }
    }

    pub fn register<T: Component>(self) -> Result<Self, Error> {
        Ok(Self {
            app: self.app.register::<T>()?,
        })
    }

    /// Register every discovered component.
    pub fn scan(self) -> Result<Self, Error> {
        Ok(Self {
            app: self.app.scan()?,
        })
    }

    pub fn middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        Self {
            app: self.app.middleware(middleware),
        }
    }

    pub async fn build(self) -> Result<TestApp, Error> {
        TestApp::bootstrap(self.app).await
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_app() {
        let app = TestAppBuilder::new().build().await.unwrap();
        assert!(app.container.is_empty());
        assert_eq!(app.client().get("/").await.status(), 404);
    }

    #[tokio::test]
    async fn test_unknown_component_lookup() {
        let app = TestAppBuilder::with_config(AppConfig::default().route_prefix("/api"))
            .build()
            .await
            .unwrap();
        assert!(app.get::<String>("missing").is_err());
    }
}
