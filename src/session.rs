use tower_sessions::cookie::{Cookie, SameSite};

// keys in the short-lived OAuth redirect session
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";

pub const TOKEN_COOKIE: &str = "token";

pub fn token_cookie(token: &str, max_age: time::Duration, secure: bool) -> String {
    Cookie::build((TOKEN_COOKIE, token.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(max_age)
        .build()
        .to_string()
}

pub fn cleared_token_cookie(secure: bool) -> String {
    token_cookie("none", time::Duration::ZERO, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cookie_attributes() {
        let cookie = token_cookie("abc", time::Duration::days(7), true);
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn cleared_cookie_expires_now() {
        let cookie = cleared_token_cookie(false);
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }
}
