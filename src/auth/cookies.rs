//! Cookie transport for auth tokens
//!
//! Both tokens travel in `HttpOnly`, `SameSite=Lax` cookies whose
//! `Max-Age` matches the token lifetime. `Secure` is set in production.

use axum_extra::extract::cookie::CookieJar;
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};

use crate::models::TokenPair;

pub const ACCESS_COOKIE: &str = "access";
pub const REFRESH_COOKIE: &str = "refresh";

/// Builds, reads and clears the auth cookies
#[derive(Debug, Clone)]
pub struct CookieManager {
    secure: bool,
    access_max_age: CookieDuration,
    refresh_max_age: CookieDuration,
}

impl CookieManager {
    pub fn new(secure: bool, access_ttl: chrono::Duration, refresh_ttl: chrono::Duration) -> Self {
        Self {
            secure,
            access_max_age: CookieDuration::seconds(access_ttl.num_seconds()),
            refresh_max_age: CookieDuration::seconds(refresh_ttl.num_seconds()),
        }
    }

    pub fn set_auth_cookies(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        jar.add(self.cookie(ACCESS_COOKIE, pair.access_token.clone(), self.access_max_age))
            .add(self.cookie(REFRESH_COOKIE, pair.refresh_token.clone(), self.refresh_max_age))
    }

    /// Expire both cookies on the client
    pub fn clear_auth_cookies(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.cookie(ACCESS_COOKIE, String::new(), CookieDuration::ZERO))
            .add(self.cookie(REFRESH_COOKIE, String::new(), CookieDuration::ZERO))
    }

    pub fn access_token(jar: &CookieJar) -> Option<String> {
        non_empty(jar, ACCESS_COOKIE)
    }

    pub fn refresh_token(jar: &CookieJar) -> Option<String> {
        non_empty(jar, REFRESH_COOKIE)
    }

    fn cookie(
        &self,
        name: &'static str,
        value: String,
        max_age: CookieDuration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build()
    }
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::SET_COOKIE;
    use axum::response::IntoResponse;

    fn manager(secure: bool) -> CookieManager {
        CookieManager::new(secure, chrono::Duration::minutes(30), chrono::Duration::days(7))
    }

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
        }
    }

    fn set_cookie_headers(jar: CookieJar) -> Vec<String> {
        let response = (jar, ()).into_response();
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_set_auth_cookies() {
        let jar = manager(false).set_auth_cookies(CookieJar::new(), &pair());

        let access = jar.get(ACCESS_COOKIE).unwrap();
        assert_eq!(access.value(), "access-token");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.max_age(), Some(CookieDuration::minutes(30)));

        let refresh = jar.get(REFRESH_COOKIE).unwrap();
        assert_eq!(refresh.value(), "refresh-token");
        assert_eq!(refresh.max_age(), Some(CookieDuration::days(7)));

        assert_eq!(CookieManager::access_token(&jar).as_deref(), Some("access-token"));
        assert_eq!(CookieManager::refresh_token(&jar).as_deref(), Some("refresh-token"));
    }

    #[test]
    fn test_secure_flag_follows_environment() {
        let jar = manager(true).set_auth_cookies(CookieJar::new(), &pair());
        assert_eq!(jar.get(ACCESS_COOKIE).unwrap().secure(), Some(true));

        let jar = manager(false).set_auth_cookies(CookieJar::new(), &pair());
        assert_ne!(jar.get(ACCESS_COOKIE).unwrap().secure(), Some(true));
    }

    #[test]
    fn test_clear_auth_cookies() {
        let cookies = manager(false);
        let jar = cookies.set_auth_cookies(CookieJar::new(), &pair());
        let jar = cookies.clear_auth_cookies(jar);

        assert!(CookieManager::access_token(&jar).is_none());
        assert!(CookieManager::refresh_token(&jar).is_none());

        let headers = set_cookie_headers(jar);
        assert!(headers
            .iter()
            .any(|h| h.starts_with("access=;") && h.contains("Max-Age=0")));
        assert!(headers
            .iter()
            .any(|h| h.starts_with("refresh=;") && h.contains("Max-Age=0")));
    }
}
