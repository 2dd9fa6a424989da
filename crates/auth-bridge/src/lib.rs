//! # Authentication bridge
//!
//! Logs a scenario in through the identity provider's browser login form and
//! hands the resulting session cookie to the HTTP session. Browser mechanics
//! stay behind [`Browser`]/[`BrowserLauncher`]; the rest of the harness only
//! sees [`probe_core::Authenticator`].

pub use probe_core;

mod bridge;
mod browser;
mod driver;
mod webdriver;

pub use bridge::{AuthBridge, LoginForm, DEFAULT_SESSION_COOKIE};
pub use browser::{Browser, BrowserLauncher, ElementId};
pub use driver::{ChromeDriverProcess, WebDriverBrowser, WebDriverLauncher};
pub use webdriver::{WebDriverClient, WebDriverError, WebDriverSession};
