//! Request classification.
//!
//! Routing is an ordered table of (matcher, strategy) pairs evaluated
//! first-match-wins, with a network-first fallback when nothing matches:
//!
//! | # | Matcher | Strategy |
//! |---|---------|----------|
//! | 1 | non-GET method | pass through |
//! | 2 | non-HTTP(S) scheme | pass through |
//! | 3 | navigation or app-shell identity | stale-while-revalidate |
//! | 4 | image destination | cache-first, 404 placeholder |
//! | 5.. | host rules, in configured order | per host class |
//! | - | anything else | network-first, no store |

pub mod strategy;

use http::Method;
use pagekeep_core::{ConfigError, Destination, HostClass, HostRule, Request, WorkerConfig};
use std::collections::HashSet;
use url::Url;

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    /// Serve the cached copy and refresh it in the background; fetch on miss.
    StaleWhileRevalidate,
    /// Cached copy, else network (stored if 2xx); empty 404 when offline.
    CacheFirstWithPlaceholder,
    /// Cached copy, else network (stored if 2xx); failures propagate.
    CacheFirst,
    /// Network, falling back to the cached copy on failure.
    NetworkFirst {
        /// Store successful responses for later fallback.
        store: bool,
    },
}

impl Strategy {
    /// Strategy for a configured host class.
    pub fn for_host_class(class: HostClass) -> Self {
        match class {
            HostClass::StaticAssets => Strategy::CacheFirst,
            HostClass::RealtimeBackend => Strategy::Passthrough,
            HostClass::BibliographicApi => Strategy::NetworkFirst { store: true },
        }
    }
}

/// Request predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    NonGet,
    NonHttp,
    /// Navigation requests and exact app-shell identities.
    AppShell(HashSet<String>),
    Image,
    /// Hostname contains any of the patterns.
    HostContains(Vec<String>),
    Any,
}

impl Matcher {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Matcher::NonGet => request.method != Method::GET,
            Matcher::NonHttp => !request.is_http(),
            Matcher::AppShell(identities) => request.is_navigation() || identities.contains(&request.identity()),
            Matcher::Image => request.destination == Destination::Image,
            Matcher::HostContains(patterns) => request
                .url
                .host_str()
                .is_some_and(|host| patterns.iter().any(|p| host.contains(p.as_str()))),
            Matcher::Any => true,
        }
    }
}

/// One row of the routing table.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub matcher: Matcher,
    pub strategy: Strategy,
}

impl Route {
    pub fn new(name: impl Into<String>, matcher: Matcher, strategy: Strategy) -> Self {
        Self { name: name.into(), matcher, strategy }
    }
}

/// Ordered routing table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    fallback: Route,
}

impl RouteTable {
    /// Build the table from resolved app-shell URLs and host rules.
    pub fn new(app_shell: &[Url], host_rules: &[HostRule]) -> Self {
        let identities = app_shell.iter().map(pagekeep_core::request::identity_of).collect();

        let mut routes = vec![
            Route::new("non-get", Matcher::NonGet, Strategy::Passthrough),
            Route::new("non-http", Matcher::NonHttp, Strategy::Passthrough),
            Route::new("app-shell", Matcher::AppShell(identities), Strategy::StaleWhileRevalidate),
            Route::new("image", Matcher::Image, Strategy::CacheFirstWithPlaceholder),
        ];
        routes.extend(host_rules.iter().map(|rule| {
            Route::new(
                host_route_name(rule.class),
                Matcher::HostContains(rule.patterns.clone()),
                Strategy::for_host_class(rule.class),
            )
        }));

        Self { routes, fallback: Route::new("default", Matcher::Any, Strategy::NetworkFirst { store: false }) }
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.app_shell_urls()?, &config.host_rules))
    }

    /// First route whose matcher accepts `request`.
    pub fn classify(&self, request: &Request) -> &Route {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(request))
            .unwrap_or(&self.fallback)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().chain(std::iter::once(&self.fallback))
    }
}

fn host_route_name(class: HostClass) -> &'static str {
    match class {
        HostClass::StaticAssets => "static-assets",
        HostClass::RealtimeBackend => "realtime-backend",
        HostClass::BibliographicApi => "bibliographic-api",
    }
}
