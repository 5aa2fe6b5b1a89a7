//! Tap request parsing
//!
//! A tag emits a URL such as `https://host/tap?data=<hex>&cmac=<hex>`. Older tags use the
//! short form `p` for the payload parameter.

use url::Url;

/// Reasons a request cannot be turned into a tap
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Neither `data` nor `p` was present
    #[error("request carries no tap payload")]
    MissingData,

    /// The text was not a URL
    #[error("invalid tap URL: {0}")]
    InvalidUrl(String),
}

/// Query parameters of one tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapRequest {
    /// Hex ciphertext from the tag
    pub data: String,
    /// Integrity code, if the tag sent one
    pub auth_tag: Option<String>,
}

impl TapRequest {
    /// Build a request from explicit values
    pub fn new(data: impl Into<String>, auth_tag: Option<String>) -> Self {
        Self {
            data: data.into(),
            auth_tag,
        }
    }

    /// Build a request from decoded query pairs; `data` wins over `p` when both appear
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut data = None;
        let mut short = None;
        let mut auth_tag = None;

        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "data" if data.is_none() => data = Some(value.to_string()),
                "p" if short.is_none() => short = Some(value.to_string()),
                "cmac" if auth_tag.is_none() => auth_tag = Some(value.to_string()),
                _ => {}
            }
        }

        let present = |value: &String| !value.trim().is_empty();
        let data = data
            .filter(present)
            .or(short.filter(present))
            .ok_or(RequestError::MissingData)?;
        Ok(Self {
            data,
            auth_tag: auth_tag.filter(present),
        })
    }

    /// Build a request from the full URL a tag emitted
    pub fn from_url(text: &str) -> Result<Self, RequestError> {
        let url = Url::parse(text.trim()).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        Self::from_query(url.query_pairs())
    }

    /// Integrity code as a string slice
    pub fn auth_tag(&self) -> Option<&str> {
        self.auth_tag.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_full_tap_url() {
        let request =
            TapRequest::from_url("https://example.org/tap?data=EF963FF7&cmac=94EED9EE65337086")
                .unwrap();
        assert_eq!(request.data, "EF963FF7");
        assert_eq!(request.auth_tag(), Some("94EED9EE65337086"));
    }

    #[test]
    fn accepts_short_alias() {
        let request = TapRequest::from_query([("p", "ABCD")]).unwrap();
        assert_eq!(request.data, "ABCD");
        assert_eq!(request.auth_tag(), None);
    }

    #[test]
    fn data_wins_over_alias() {
        let request = TapRequest::from_query([("p", "1111"), ("data", "2222")]).unwrap();
        assert_eq!(request.data, "2222");

        let request = TapRequest::from_query([("data", " "), ("p", "3333")]).unwrap();
        assert_eq!(request.data, "3333");
    }

    #[test]
    fn missing_or_blank_payload_is_rejected() {
        assert_matches!(
            TapRequest::from_query([("cmac", "00")]),
            Err(RequestError::MissingData)
        );
        assert_matches!(
            TapRequest::from_url("https://example.org/tap?data="),
            Err(RequestError::MissingData)
        );
        assert_matches!(
            TapRequest::from_url("not a url"),
            Err(RequestError::InvalidUrl(_))
        );
    }
}
