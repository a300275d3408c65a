use lambdagate_core::http::{
    header::{CONTENT_ENCODING, CONTENT_TYPE},
    HeaderMap,
};

const WILDCARD: &str = "*/*";

/// Decides which response bodies are returned base64 encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BinaryPolicy {
    /// Every body is binary (`*/*`).
    All,
    /// Bodies whose content type matches one of the patterns, or that carry a content encoding.
    Types(Vec<String>),
    /// Every body is returned as text.
    #[default]
    None,
}

impl BinaryPolicy {
    /// Build a policy from media-type patterns such as `image/*` or `*/*`.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        if types.iter().any(|ty| ty.trim() == WILDCARD) {
            BinaryPolicy::All
        } else if types.is_empty() {
            BinaryPolicy::None
        } else {
            BinaryPolicy::Types(types)
        }
    }

    pub fn is_binary(&self, headers: &HeaderMap) -> bool {
        match self {
            BinaryPolicy::All => true,
            BinaryPolicy::None => false,
            BinaryPolicy::Types(patterns) => {
                if is_encoded(headers) {
                    return true;
                }
                let Some(media_type) = media_type(headers) else {
                    return false;
                };
                patterns
                    .iter()
                    .any(|pattern| matches_pattern(pattern.trim(), &media_type))
            }
        }
    }
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .is_some_and(|encoding| !encoding.is_empty() && !encoding.eq_ignore_ascii_case("identity"))
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let media_type = raw.split(';').next().map(str::trim).unwrap_or("");
    if media_type.is_empty() {
        None
    } else {
        Some(media_type.to_ascii_lowercase())
    }
}

fn matches_pattern(pattern: &str, media_type: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }
    let pattern = pattern.to_ascii_lowercase();
    match pattern.strip_suffix("/*") {
        Some(ty) => media_type
            .split_once('/')
            .is_some_and(|(candidate, _)| candidate == ty),
        None => pattern == media_type,
    }
}
