//! In-memory [`Driver`] with scripted pages, for adapter and orchestrator tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, ElementHandle, ElementState, Locator};
use crate::error::{Error, Result};

/// What happens when a fake element is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    Nothing,
    Navigate(String),
    Intercepted,
    NotInteractable,
    /// Fails scripted clicks too.
    Blocked,
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    text: String,
    attrs: HashMap<String, String>,
    displayed: bool,
    enabled: bool,
    on_click: ClickEffect,
    children: Vec<(Locator, FakeNode)>,
}

impl FakeNode {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
            displayed: true,
            enabled: true,
            on_click: ClickEffect::Nothing,
            children: Vec::new(),
        }
    }

    pub fn link(text: &str, href: &str) -> Self {
        Self::new(text).attr("href", href)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = effect;
        self
    }

    pub fn child(mut self, locator: Locator, node: Self) -> Self {
        self.children.push((locator, node));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    roots: Vec<(Locator, FakeNode)>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: Locator, node: FakeNode) -> Self {
        self.roots.push((locator, node));
        self
    }
}

#[derive(Default)]
struct State {
    url: String,
    pages: HashMap<String, FakePage>,
    redirects: HashMap<String, String>,
    goto_failures: HashMap<String, usize>,
    stale_lookups: Vec<Locator>,
    /// Handle id -> child index path from the page roots.
    handles: HashMap<u64, Vec<usize>>,
    next_handle: u64,
    visits: Vec<String>,
    clicks: Vec<String>,
    implicit_wait: Option<Duration>,
    quit_calls: usize,
}

impl State {
    fn node(&self, handle: ElementHandle) -> Result<&FakeNode> {
        let path = self.handles.get(&handle.0).ok_or(Error::StaleElement)?;
        let page = self.pages.get(&self.url).ok_or(Error::StaleElement)?;
        let (first, rest) = path.split_first().ok_or(Error::StaleElement)?;
        let mut node = &page.roots.get(*first).ok_or(Error::StaleElement)?.1;
        for index in rest {
            node = &node.children.get(*index).ok_or(Error::StaleElement)?.1;
        }
        Ok(node)
    }

    fn navigate(&mut self, url: &str) {
        self.handles.clear();
        let target = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        self.url = target;
    }
}

/// Cloneable fake browser; clones share the same state so tests can inspect
/// what the code under test did.
#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    pub fn new(start_url: &str) -> Self {
        let state = State {
            url: start_url.to_string(),
            next_handle: 1,
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), page);
        self
    }

    /// Navigating to `from` lands on `to`.
    pub fn redirect(self, from: &str, to: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    /// The next `times` navigations to `url` fail.
    pub fn fail_goto(self, url: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .goto_failures
            .insert(url.to_string(), times);
        self
    }

    /// Lookups of `locator` report a re-rendered page.
    pub fn stale_lookup(self, locator: Locator) -> Self {
        self.state.lock().unwrap().stale_lookups.push(locator);
        self
    }

    /// Handles that have not been released or invalidated.
    pub fn live_handles(&self) -> usize {
        self.state.lock().unwrap().handles.len()
    }

    /// Moves the browser without going through [`Driver::goto`].
    pub fn drift_to(&self, url: &str) {
        self.state.lock().unwrap().navigate(url);
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    /// Texts of clicked elements, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn implicit_wait(&self) -> Option<Duration> {
        self.state.lock().unwrap().implicit_wait
    }

    pub fn quit_calls(&self) -> usize {
        self.state.lock().unwrap().quit_calls
    }

    fn apply_click(&self, element: ElementHandle, bypass_checks: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let node = state.node(element)?;
        let (text, effect) = (node.text.clone(), node.on_click.clone());
        match effect {
            ClickEffect::Blocked => return Err(Error::NotInteractable),
            ClickEffect::Intercepted if !bypass_checks => return Err(Error::ClickIntercepted),
            ClickEffect::NotInteractable if !bypass_checks => return Err(Error::NotInteractable),
            _ => {}
        }
        state.clicks.push(text);
        if let ClickEffect::Navigate(url) = effect {
            state.navigate(&url);
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.visits.push(url.to_string());
        if let Some(remaining) = state.goto_failures.get_mut(url)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::WebDriver(format!("net::ERR_CONNECTION_RESET at {url}")));
        }
        state.navigate(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url())
    }

    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let mut state = self.state.lock().unwrap();
        if state.stale_lookups.contains(locator) {
            return Err(Error::StaleElement);
        }
        let (base, candidates): (Vec<usize>, Vec<&(Locator, FakeNode)>) = match scope {
            Some(handle) => {
                let base = state.handles.get(&handle.0).cloned().ok_or(Error::StaleElement)?;
                (base, state.node(handle)?.children.iter().collect())
            }
            None => (
                Vec::new(),
                state
                    .pages
                    .get(&state.url)
                    .map(|p| p.roots.iter().collect())
                    .unwrap_or_default(),
            ),
        };
        let matches: Vec<Vec<usize>> = candidates
            .iter()
            .enumerate()
            .filter(|(_, entry)| &entry.0 == locator)
            .map(|(i, _)| {
                let mut path = base.clone();
                path.push(i);
                path
            })
            .collect();

        let mut found = Vec::with_capacity(matches.len());
        for path in matches {
            let id = state.next_handle;
            state.next_handle += 1;
            state.handles.insert(id, path);
            found.push(ElementHandle(id));
        }
        Ok(found)
    }

    async fn state(&self, element: ElementHandle) -> Result<ElementState> {
        let state = self.state.lock().unwrap();
        let node = state.node(element)?;
        Ok(ElementState {
            displayed: node.displayed,
            enabled: node.enabled,
        })
    }

    async fn text(&self, element: ElementHandle) -> Result<String> {
        Ok(self.state.lock().unwrap().node(element)?.text.clone())
    }

    async fn attr(&self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .node(element)?
            .attrs
            .get(name)
            .cloned())
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        self.apply_click(element, false)
    }

    async fn script_click(&self, element: ElementHandle) -> Result<()> {
        self.apply_click(element, true)
    }

    async fn set_implicit_wait(&self, wait: Duration) -> Result<()> {
        self.state.lock().unwrap().implicit_wait = Some(wait);
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.quit_calls += 1;
        state.handles.clear();
        Ok(())
    }

    fn release(&self, handles: &[ElementHandle]) {
        let mut state = self.state.lock().unwrap();
        for handle in handles {
            state.handles.remove(&handle.0);
        }
    }
}
