use thiserror::Error;

pub const MAX_DIMENSION: i64 = 5000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Path should start with /")]
    MissingLeadingSlash,

    #[error("Expected /<transform>/<width>/<height>/<source-url>")]
    MalformedPath,

    #[error("{0} is not a number")]
    InvalidNumber(&'static str),

    #[error("{0} not specified or invalid")]
    OutOfRange(&'static str),
}

/// A parsed transform request: `/<transform>/<width>/<height>/<source-url>`.
///
/// The source segment is everything after the third separator, query string
/// included; it is handed to the upstream fetch verbatim and truncated at
/// the first `?` for the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub transform: String,
    pub width: u32,
    pub height: u32,
    pub source: String,
}

impl RequestDescriptor {
    pub fn parse(uri: &str) -> Result<Self, ParseError> {
        let rest = uri.strip_prefix('/').ok_or(ParseError::MissingLeadingSlash)?;
        let mut parts = rest.splitn(4, '/');
        let transform = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::MalformedPath)?;
        let width = parts.next().ok_or(ParseError::MalformedPath)?;
        let height = parts.next().ok_or(ParseError::MalformedPath)?;
        let source = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::MalformedPath)?;

        Ok(Self {
            transform: transform.to_string(),
            width: parse_dimension(width, "Width")?,
            height: parse_dimension(height, "Height")?,
            source: source.to_string(),
        })
    }

    /// Escaped file name for the cache entry, query string stripped.
    pub fn cache_key(&self) -> String {
        let stripped = match self.source.split_once('?') {
            Some((head, _)) => head,
            None => self.source.as_str(),
        };
        url::form_urlencoded::byte_serialize(stripped.as_bytes()).collect()
    }

    /// Upstream URL; the scheme is always upgraded to HTTPS.
    pub fn source_url(&self) -> String {
        format!("https://{}", self.source)
    }
}

fn parse_dimension(raw: &str, field: &'static str) -> Result<u32, ParseError> {
    let value: i64 = raw.parse().map_err(|_| ParseError::InvalidNumber(field))?;
    if !(1..=MAX_DIMENSION).contains(&value) {
        return Err(ParseError::OutOfRange(field));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_request() {
        let descriptor = RequestDescriptor::parse("/thumb/100/50/example.com/path/a.jpg").unwrap();
        assert_eq!(descriptor.transform, "thumb");
        assert_eq!(descriptor.width, 100);
        assert_eq!(descriptor.height, 50);
        assert_eq!(descriptor.source, "example.com/path/a.jpg");
    }

    #[test]
    fn source_keeps_its_query_for_the_fetch() {
        let descriptor =
            RequestDescriptor::parse("/thumb/100/50/example.com/a.jpg?v=2&sig=abc").unwrap();
        assert_eq!(descriptor.source, "example.com/a.jpg?v=2&sig=abc");
        assert_eq!(
            descriptor.source_url(),
            "https://example.com/a.jpg?v=2&sig=abc"
        );
    }

    #[test]
    fn cache_key_strips_the_query_and_escapes() {
        let descriptor =
            RequestDescriptor::parse("/thumb/100/50/example.com/a.jpg?v=2&sig=abc").unwrap();
        assert_eq!(descriptor.cache_key(), "example.com%2Fa.jpg");
    }

    #[test]
    fn cache_key_is_a_single_path_segment() {
        let descriptor =
            RequestDescriptor::parse("/thumb/100/50/example.com/deep/path/a.jpg").unwrap();
        assert!(!descriptor.cache_key().contains('/'));
    }

    #[test]
    fn missing_leading_slash_is_rejected() {
        assert_eq!(
            RequestDescriptor::parse("thumb/100/50/example.com/a.jpg"),
            Err(ParseError::MissingLeadingSlash)
        );
    }

    #[test]
    fn short_paths_are_malformed() {
        assert_eq!(
            RequestDescriptor::parse("/thumb/100/50"),
            Err(ParseError::MalformedPath)
        );
        assert_eq!(RequestDescriptor::parse("/"), Err(ParseError::MalformedPath));
    }

    #[test]
    fn non_numeric_width_is_its_own_failure() {
        assert_eq!(
            RequestDescriptor::parse("/thumb/wide/50/example.com/a.jpg"),
            Err(ParseError::InvalidNumber("Width"))
        );
    }

    #[test]
    fn out_of_range_dimensions_are_rejected() {
        assert_eq!(
            RequestDescriptor::parse("/thumb/5001/50/example.com/a.jpg"),
            Err(ParseError::OutOfRange("Width"))
        );
        assert_eq!(
            RequestDescriptor::parse("/thumb/100/0/example.com/a.jpg"),
            Err(ParseError::OutOfRange("Height"))
        );
        assert_eq!(
            RequestDescriptor::parse("/thumb/100/-3/example.com/a.jpg"),
            Err(ParseError::OutOfRange("Height"))
        );
    }

    #[test]
    fn boundary_dimensions_are_accepted() {
        let descriptor = RequestDescriptor::parse("/thumb/1/5000/example.com/a.jpg").unwrap();
        assert_eq!(descriptor.width, 1);
        assert_eq!(descriptor.height, 5000);
    }
}
