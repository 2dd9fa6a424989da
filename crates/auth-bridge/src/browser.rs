//! Browser abstraction used by the login flow

use async_trait::async_trait;
use probe_core::Result;

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// The handful of page interactions a login form needs.
#[async_trait]
pub trait Browser: Send + Sync {
    fn describe(&self) -> String;

    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Look up an element by its `id` attribute; `None` when absent.
    async fn find_by_id(&mut self, id: &str) -> Result<Option<ElementId>>;

    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<()>;

    async fn click(&mut self, element: &ElementId) -> Result<()>;

    /// Value of the named cookie in the browser's jar.
    async fn cookie(&mut self, name: &str) -> Result<Option<String>>;

    async fn quit(self: Box<Self>) -> Result<()>;
}

/// Starts an isolated browser instance for one scenario.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>>;
}
