//! Cookie sessions held in memory. Restarting the server logs everyone out.

use axum::http::{header, HeaderMap, HeaderValue};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const SESSION_COOKIE: &str = "nationgrid.sid";

#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    secure: bool,
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, secure: bool) -> Self {
        Self {
            ttl,
            secure,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a session and returns its token.
    pub fn create(&self, user_id: &str) -> String {
        let token = new_token();
        let now = Instant::now();
        let mut map = self.lock();
        map.retain(|_, s| s.expires_at > now);
        map.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// User behind `token`, if the session is live. Expired entries are dropped.
    pub fn user_id(&self, token: &str) -> Option<String> {
        let mut map = self.lock();
        match map.get(token) {
            Some(s) if s.expires_at > Instant::now() => Some(s.user_id.clone()),
            Some(_) => {
                map.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn destroy(&self, token: &str) {
        self.lock().remove(token);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_cookie(&self, token: &str) -> HeaderValue {
        self.cookie(token, self.ttl.as_secs())
    }

    pub fn clear_cookie(&self) -> HeaderValue {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> HeaderValue {
        let mut s = format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            s.push_str("; Secure");
        }
        // Tokens are hex, so the header is always valid ASCII.
        HeaderValue::from_str(&s).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Session token from the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_resolve_then_destroy() {
        let store = SessionStore::new(Duration::from_secs(60), false);
        let token = store.create("usr-1");
        assert_eq!(token.len(), 64);
        assert_eq!(store.user_id(&token).as_deref(), Some("usr-1"));
        store.destroy(&token);
        assert_eq!(store.user_id(&token), None);
    }

    #[test]
    fn expired_sessions_are_rejected_and_pruned() {
        let store = SessionStore::new(Duration::ZERO, false);
        let token = store.create("usr-1");
        assert_eq!(store.user_id(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn cookie_attributes() {
        let store = SessionStore::new(Duration::from_secs(3600), true);
        let c = store.set_cookie("abc");
        let c = c.to_str().unwrap();
        assert!(c.starts_with("nationgrid.sid=abc;"));
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("SameSite=Lax"));
        assert!(c.contains("Max-Age=3600"));
        assert!(c.ends_with("; Secure"));

        let cleared = store.clear_cookie();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn token_parsed_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; nationgrid.sid=deadbeef; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("deadbeef"));

        headers.insert(header::COOKIE, HeaderValue::from_static("nationgrid.sid="));
        assert_eq!(token_from_headers(&headers), None);
    }
}
