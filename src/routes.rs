//! Route patterns a lobby session listens on, and the navigation paths it
//! drives.
//!
//! Events for a lobby arrive on three route shapes:
//!
//! | Pattern                              | Carries                          |
//! |--------------------------------------|----------------------------------|
//! | `/lobbies/:lobby`                    | events for everyone in the lobby |
//! | `/lobbies/:lobby/:playerName`        | events for one player            |
//! | `/lobbies/:lobby/:userId/:clientId`  | events for one client            |
//!
//! A session binds all three for its own lobby name and ignores events on
//! any other route.
//!
//! Lobby names are percent-encoded inside paths, the same way
//! `encodeURIComponent` encodes them, so a name may contain spaces or `/`.

use std::collections::HashMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left unescaped in a path segment: alphanumerics and `-_.!~*'()`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Route patterns bound by every lobby session.
pub const LOBBY_ROUTE_PATTERNS: [&str; 3] = [
    "/lobbies/:lobby",
    "/lobbies/:lobby/:playerName",
    "/lobbies/:lobby/:userId/:clientId",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A `/`-separated route pattern where `:name` segments capture a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern such as `/lobbies/:lobby`.
    pub fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Match a concrete route, returning the captured parameters.
    pub fn matches(&self, route: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = split(route).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(RouteParams(params))
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Parameters captured by a [`RoutePattern`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteParams(HashMap<String, String>);

impl RouteParams {
    /// Value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// The set of routes one lobby session listens on.
#[derive(Debug, Clone)]
pub struct LobbyRouteBinding {
    lobby: String,
    patterns: Vec<RoutePattern>,
}

impl LobbyRouteBinding {
    /// Bind the lobby route patterns for `lobby`.
    pub fn new(lobby: impl Into<String>) -> Self {
        Self {
            lobby: lobby.into(),
            patterns: LOBBY_ROUTE_PATTERNS
                .iter()
                .map(|p| RoutePattern::parse(p))
                .collect(),
        }
    }

    /// Name of the bound lobby.
    pub fn lobby(&self) -> &str {
        &self.lobby
    }

    /// Patterns bound by this session.
    pub fn patterns(&self) -> &[RoutePattern] {
        &self.patterns
    }

    /// Whether an event on `route` belongs to this session.
    ///
    /// The captured lobby segment is percent-decoded before it is compared
    /// with the bound name. Segments that do not decode to UTF-8 never match.
    pub fn accepts(&self, route: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            pattern
                .matches(route)
                .and_then(|params| params.get("lobby").and_then(decode_segment))
                .is_some_and(|lobby| lobby == self.lobby)
        })
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

// ── Navigation paths ────────────────────────────────────────────────

/// Path of the lobby's main view.
pub fn lobby_path(lobby: &str) -> String {
    format!("/lobbies/{}", encode_segment(lobby))
}

/// Path of the lobby's loading screen.
pub fn loading_game_path(lobby: &str) -> String {
    format!("/lobbies/{}/loading-game", encode_segment(lobby))
}

/// Path of the lobby's in-game view.
pub fn active_game_path(lobby: &str) -> String {
    format!("/lobbies/{}/active-game", encode_segment(lobby))
}
