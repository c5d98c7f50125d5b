//! Navigation capability and the login redirect

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Where the host currently is and how to send it elsewhere
///
/// In a browser this is `window.location`; other hosts keep their own notion
/// of the current page.
pub trait Navigator: Send + Sync {
    /// Path (plus query) of the page the user is on
    fn current_location(&self) -> String;

    /// Leave the current page for `url`
    fn navigate(&self, url: &str);
}

/// Builds the login URL that brings the user back afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    login_path: String,
}

impl LoginRedirect {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// `<login_path>?next=<location>` with the location URL-encoded
    pub fn target(&self, location: &str) -> String {
        let next: String = url::form_urlencoded::byte_serialize(location.as_bytes()).collect();
        let separator = if self.login_path.contains('?') { '&' } else { '?' };
        format!("{}{separator}next={next}", self.login_path)
    }

    /// Whether `location` is already the login page
    pub fn is_login_location(&self, location: &str) -> bool {
        location
            .strip_prefix(self.login_path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['?', '#']))
    }
}

impl Default for LoginRedirect {
    fn default() -> Self {
        Self::new("/login")
    }
}

/// Navigator for hosts without a browser location
///
/// Tracks the current location in memory and records every navigation, which
/// also makes it the natural stand-in for a browser in tests.
#[derive(Debug)]
pub struct HeadlessNavigator {
    state: Mutex<HeadlessState>,
}

#[derive(Debug)]
struct HeadlessState {
    location: String,
    history: Vec<String>,
}

impl HeadlessNavigator {
    /// Start at `/`
    pub fn new() -> Self {
        Self::at("/")
    }

    /// Start at `location`
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                location: location.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Move to `location` without recording a navigation
    pub fn set_location(&self, location: impl Into<String>) {
        self.lock().location = location.into();
    }

    /// Every URL passed to [`Navigator::navigate`], oldest first
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeadlessNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for HeadlessNavigator {
    fn current_location(&self) -> String {
        self.lock().location.clone()
    }

    fn navigate(&self, url: &str) {
        info!(target_url = url, "Navigating");
        let mut state = self.lock();
        state.location = url.to_string();
        state.history.push(url.to_string());
    }
}

/// `window.location`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for BrowserNavigator {
    fn current_location(&self) -> String {
        web_sys::window()
            .map(|w| w.location())
            .and_then(|location| {
                let path = location.pathname().ok()?;
                let search = location.search().unwrap_or_default();
                Some(format!("{path}{search}"))
            })
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, url: &str) {
        let Some(window) = web_sys::window() else {
            tracing::warn!(target_url = url, "No window to navigate");
            return;
        };
        if let Err(err) = window.location().set_href(url) {
            tracing::warn!(target_url = url, "Navigation failed: {err:?}");
        }
    }
}
