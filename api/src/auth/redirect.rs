//! Redirect targets around the second factor.
//!
//! Before MFA: where to send a blocked request, carrying the original
//! location in a query parameter. After MFA: read that parameter back,
//! accepting only same-origin paths.

use url::{ParseError, Url, form_urlencoded};

use super::request::AuthRequest;

/// Resolves relative redirect values. Anything that leaves this origin after
/// joining is not a local path.
const PLACEHOLDER_ORIGIN: &str = "http://localhost/";
const PLACEHOLDER_HOST: &str = "localhost";

/// The URL a blocked request is sent to.
///
/// Without `query_param` this is `target` itself. Otherwise the request's
/// path and query are appended to the target's query under `query_param`.
/// The target's fragment is kept, and so are the scheme and host of an
/// absolute target: `https://sso.example/login` stays on `sso.example`
/// rather than being reduced to `/login` on the current host.
pub fn unauthenticated_redirect_url(
    target: &str,
    query_param: Option<&str>,
    request: &AuthRequest,
) -> String {
    let Some(param) = query_param.filter(|p| !p.is_empty()) else {
        return target.to_string();
    };
    let location = request.path_and_query();

    if let Ok(mut url) = Url::parse(target) {
        url.query_pairs_mut().append_pair(param, &location);
        return url.to_string();
    }

    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let path = if path.is_empty() { "/" } else { path };

    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(param, &location)
        .finish();
    let query = if query.is_empty() {
        pair
    } else {
        format!("{query}&{pair}")
    };

    match fragment {
        Some(fragment) => format!("{path}?{query}#{fragment}"),
        None => format!("{path}?{query}"),
    }
}

/// The post-MFA redirect carried in the request's `query_param`.
///
/// `None` when the parameter is unset, absent or empty, when it does not
/// parse, or when it names another origin: absolute URLs, protocol-relative
/// URLs and their backslash variants are all refused. Accepted values are
/// normalized to `/path[?query]`; the fragment is dropped.
pub fn mfa_redirect(query_param: Option<&str>, request: &AuthRequest) -> Option<String> {
    let value = request
        .query_param(query_param?)
        .map(str::trim)
        .filter(|v| !v.is_empty())?;

    match Url::parse(value) {
        Ok(_) => return None,
        Err(ParseError::RelativeUrlWithoutBase) => {}
        Err(_) => return None,
    }

    if is_protocol_relative(value) {
        return None;
    }

    let base = Url::parse(PLACEHOLDER_ORIGIN).ok()?;
    let joined = base.join(value).ok()?;
    if joined.origin() != base.origin() || joined.host_str() != Some(PLACEHOLDER_HOST) {
        return None;
    }

    Some(match joined.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", joined.path(), query),
        _ => joined.path().to_string(),
    })
}

fn is_protocol_relative(value: &str) -> bool {
    let mut leading = value.chars().take(2);
    leading.clone().count() == 2 && leading.all(|c| c == '/' || c == '\\')
}

#[cfg(test)]
mod tests {
    use axum::http::Method;

    use super::*;

    fn request(uri: &str) -> AuthRequest {
        AuthRequest::new(Method::GET, uri.parse().unwrap())
    }

    #[test]
    fn absolute_target_keeps_query_fragment_and_origin() {
        let url = unauthenticated_redirect_url(
            "https://example.com/login?x=1#frag",
            Some("redirect"),
            &request("/secret?y=2"),
        );
        assert_eq!(
            url,
            "https://example.com/login?x=1&redirect=%2Fsecret%3Fy%3D2#frag"
        );
    }

    #[test]
    fn relative_targets() {
        let secret = request("/secret?y=2");

        assert_eq!(
            unauthenticated_redirect_url("/login", Some("redirect"), &secret),
            "/login?redirect=%2Fsecret%3Fy%3D2"
        );
        assert_eq!(
            unauthenticated_redirect_url("/login?x=1#top", Some("redirect"), &secret),
            "/login?x=1&redirect=%2Fsecret%3Fy%3D2#top"
        );
        assert_eq!(
            unauthenticated_redirect_url("?x=1", Some("next"), &request("/a")),
            "/?x=1&next=%2Fa"
        );
    }

    #[test]
    fn no_query_param_returns_bare_target() {
        let secret = request("/secret?y=2");
        assert_eq!(unauthenticated_redirect_url("/login", None, &secret), "/login");
        assert_eq!(unauthenticated_redirect_url("/login", Some(""), &secret), "/login");
    }

    #[test]
    fn mfa_redirect_accepts_local_paths() {
        let accepted = |value: &str| {
            let uri = format!(
                "/v1/mfa/verify?redirect={}",
                form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            );
            mfa_redirect(Some("redirect"), &request(&uri))
        };

        assert_eq!(accepted("/ok/path?z=1").as_deref(), Some("/ok/path?z=1"));
        assert_eq!(accepted("/ok/path#section").as_deref(), Some("/ok/path"));
        assert_eq!(accepted("/ok?").as_deref(), Some("/ok"));
        assert_eq!(accepted("dashboard").as_deref(), Some("/dashboard"));
    }

    #[test]
    fn mfa_redirect_refuses_other_origins() {
        for value in [
            "https://evil.com/path",
            "//evil.com/path",
            "/\\evil.com/path",
            "\\\\evil.com",
            " //evil.com",
            "javascript:alert(1)",
            "http://[::1/",
        ] {
            let uri = format!(
                "/v1/mfa/verify?redirect={}",
                form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            );
            assert_eq!(mfa_redirect(Some("redirect"), &request(&uri)), None, "{value}");
        }
    }

    #[test]
    fn mfa_redirect_needs_a_value() {
        let with = request("/v1/mfa/verify?redirect=%2Fok");
        assert_eq!(mfa_redirect(None, &with), None);
        assert_eq!(mfa_redirect(Some("next"), &with), None);
        assert_eq!(mfa_redirect(Some("redirect"), &request("/v1/mfa/verify?redirect=")), None);
    }
}
