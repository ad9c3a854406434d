use tonic::metadata::MetadataMap;

/// Name of the cookie browsers send the session token in
const SESSION_COOKIE: &str = "jwt";

/// Extract the session token from `authorization: Bearer <token>` or, for
/// browser clients, from the `jwt` cookie.
pub(super) fn session_token(metadata: &MetadataMap) -> Option<String> {
    if let Some(value) = metadata.get("authorization").and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        if let Some(token) = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    metadata
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(session_token(&metadata).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_token() {
        let mut metadata = MetadataMap::new();
        metadata.insert("cookie", "theme=dark; jwt=tok123; lang=en".parse().unwrap());
        assert_eq!(session_token(&metadata).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", "Bearer header".parse().unwrap());
        metadata.insert("cookie", "jwt=cookie".parse().unwrap());
        assert_eq!(session_token(&metadata).as_deref(), Some("header"));
    }

    #[test]
    fn test_missing_token() {
        let mut metadata = MetadataMap::new();
        assert!(session_token(&metadata).is_none());
        metadata.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        metadata.insert("cookie", "jwt=".parse().unwrap());
        assert!(session_token(&metadata).is_none());
    }
}
