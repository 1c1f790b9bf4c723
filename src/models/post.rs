use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::ValidationErrors;
use crate::store::Document;

pub const TITLE_MIN_CHARS: usize = 2;
pub const TITLE_MAX_CHARS: usize = 200;
pub const SUMMARY_MAX_CHARS: usize = 2000;
pub const AUTHOR_MAX_CHARS: usize = 100;
pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 10.0;
pub const URL_MAX_CHARS: usize = 2083;

/// A manhwa recommendation or review, as accepted and stored.
///
/// Only obtainable from raw input through [`Post::validate`], which applies
/// the defaults, so every sequence field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub summary: Option<String>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub image_data: Vec<String>,
    pub author: Option<String>,
}

impl Document for Post {
    const COLLECTION: &'static str = "post";
}

impl Post {
    /// Validate an untyped payload against the Post contract.
    ///
    /// Unknown fields are ignored and `null` counts as absent. On failure the
    /// error lists every offending field; nothing is returned partially.
    pub fn validate(raw: &Value) -> Result<Post, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let Some(fields) = raw.as_object() else {
            errors.add("body", "must be a JSON object");
            return Err(errors);
        };

        let title = required_text(&mut errors, fields, "title", TITLE_MIN_CHARS, TITLE_MAX_CHARS);
        let summary = optional_text(&mut errors, fields, "summary", SUMMARY_MAX_CHARS);
        let rating = optional_rating(&mut errors, fields);
        let genres = string_list(&mut errors, fields, "genres");
        let links = url_list(&mut errors, fields, "links");
        let image_urls = url_list(&mut errors, fields, "image_urls");
        let image_data = string_list(&mut errors, fields, "image_data");
        let author = optional_text(&mut errors, fields, "author", AUTHOR_MAX_CHARS);

        match title {
            Some(title) if errors.is_empty() => Ok(Post {
                title,
                summary,
                rating,
                genres,
                links,
                image_urls,
                image_data,
                author,
            }),
            _ => Err(errors),
        }
    }
}

fn present<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|value| !value.is_null())
}

fn required_text(
    errors: &mut ValidationErrors,
    fields: &Map<String, Value>,
    name: &str,
    min: usize,
    max: usize,
) -> Option<String> {
    match present(fields, name) {
        None => {
            errors.add(name, "field is required");
            None
        }
        Some(Value::String(text)) => {
            let len = text.chars().count();
            if len < min {
                errors.add(name, format!("must be at least {} characters", min));
                None
            } else if len > max {
                errors.add(name, format!("must be at most {} characters", max));
                None
            } else {
                Some(text.clone())
            }
        }
        Some(_) => {
            errors.add(name, "must be a string");
            None
        }
    }
}

fn optional_text(
    errors: &mut ValidationErrors,
    fields: &Map<String, Value>,
    name: &str,
    max: usize,
) -> Option<String> {
    match present(fields, name)? {
        Value::String(text) if text.chars().count() > max => {
            errors.add(name, format!("must be at most {} characters", max));
            None
        }
        Value::String(text) => Some(text.clone()),
        _ => {
            errors.add(name, "must be a string");
            None
        }
    }
}

fn optional_rating(errors: &mut ValidationErrors, fields: &Map<String, Value>) -> Option<f64> {
    let value = present(fields, "rating")?;
    match value.as_f64() {
        Some(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => Some(rating),
        Some(_) => {
            errors.add(
                "rating",
                format!("must be between {} and {}", RATING_MIN, RATING_MAX),
            );
            None
        }
        None => {
            errors.add("rating", "must be a number");
            None
        }
    }
}

fn string_list(
    errors: &mut ValidationErrors,
    fields: &Map<String, Value>,
    name: &str,
) -> Vec<String> {
    let Some(value) = present(fields, name) else {
        return Vec::new();
    };
    let Value::Array(items) = value else {
        errors.add(name, "must be a list of strings");
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::String(text) => out.push(text.clone()),
            _ => errors.add(name, format!("item {} must be a string", index)),
        }
    }
    out
}

fn url_list(errors: &mut ValidationErrors, fields: &Map<String, Value>, name: &str) -> Vec<String> {
    let before = errors.fields().len();
    let raw = string_list(errors, fields, name);
    if errors.fields().len() > before {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(raw.len());
    for (index, candidate) in raw.iter().enumerate() {
        match parse_http_url(candidate) {
            Ok(url) => out.push(url),
            Err(reason) => errors.add(name, format!("item {} {}", index, reason)),
        }
    }
    out
}

/// Parse an absolute http(s) URL and return its canonical serialisation.
pub fn parse_http_url(candidate: &str) -> Result<String, String> {
    if candidate.chars().count() > URL_MAX_CHARS {
        return Err(format!("must be at most {} characters", URL_MAX_CHARS));
    }

    let url = Url::parse(candidate).map_err(|e| format!("is not a valid URL: {}", e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err("must use the http or https scheme".to_string());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("must include a host".to_string());
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_post_gets_defaults() {
        let post = Post::validate(&json!({"title": "Solo Leveling"})).expect("valid post");

        assert_eq!(post.title, "Solo Leveling");
        assert_eq!(post.summary, None);
        assert_eq!(post.rating, None);
        assert!(post.genres.is_empty());
        assert!(post.links.is_empty());
        assert!(post.image_urls.is_empty());
        assert!(post.image_data.is_empty());
        assert_eq!(post.author, None);
    }

    #[test]
    fn test_full_post() {
        let raw = json!({
            "title": "Omniscient Reader",
            "summary": "A reader becomes part of the story.",
            "rating": 9,
            "genres": ["action", "fantasy"],
            "links": ["https://example.com/orv"],
            "image_urls": ["http://img.example.com/cover.png"],
            "image_data": ["iVBORw0KGgo="],
            "author": "kim"
        });

        let post = Post::validate(&raw).expect("valid post");

        assert_eq!(post.rating, Some(9.0));
        assert_eq!(post.genres, vec!["action", "fantasy"]);
        assert_eq!(post.links, vec!["https://example.com/orv"]);
        assert_eq!(post.image_urls, vec!["http://img.example.com/cover.png"]);
        assert_eq!(post.image_data, vec!["iVBORw0KGgo="]);
        assert_eq!(post.author.as_deref(), Some("kim"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let post = Post::validate(&json!({"title": "Tower of God", "likes": 12, "_id": "x"}))
            .expect("valid post");

        let serialized = serde_json::to_value(&post).expect("serialize post");
        let keys: Vec<&String> = serialized.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 8);
        assert!(serialized.get("likes").is_none());
        assert!(serialized.get("_id").is_none());
    }

    #[test]
    fn test_null_fields_count_as_absent() {
        let post = Post::validate(&json!({
            "title": "The Breaker",
            "summary": null,
            "rating": null,
            "genres": null,
            "links": null
        }))
        .expect("valid post");

        assert_eq!(post.summary, None);
        assert_eq!(post.rating, None);
        assert!(post.genres.is_empty());
        assert!(post.links.is_empty());
    }

    #[test]
    fn test_title_bounds() {
        let errors = Post::validate(&json!({"title": "A"})).unwrap_err();
        assert!(errors.has_field("title"));

        let errors = Post::validate(&json!({"title": "a".repeat(201)})).unwrap_err();
        assert!(errors.has_field("title"));

        assert!(Post::validate(&json!({"title": "ab"})).is_ok());
        assert!(Post::validate(&json!({"title": "a".repeat(200)})).is_ok());
    }

    #[test]
    fn test_title_length_counts_characters() {
        // Two Hangul syllables, six bytes in UTF-8.
        assert!(Post::validate(&json!({"title": "나혼"})).is_ok());
        assert!(Post::validate(&json!({"title": "가".repeat(200)})).is_ok());
    }

    #[test]
    fn test_missing_or_mistyped_title() {
        let errors = Post::validate(&json!({"summary": "no title"})).unwrap_err();
        assert!(errors.has_field("title"));

        let errors = Post::validate(&json!({"title": 42})).unwrap_err();
        assert!(errors.has_field("title"));
    }

    #[test]
    fn test_rating_range() {
        assert!(Post::validate(&json!({"title": "ok", "rating": 0})).is_ok());
        assert!(Post::validate(&json!({"title": "ok", "rating": 10})).is_ok());
        assert!(Post::validate(&json!({"title": "ok", "rating": 9.5})).is_ok());

        for rating in [json!(-0.1), json!(10.01), json!(100), json!("9")] {
            let errors = Post::validate(&json!({"title": "ok", "rating": rating})).unwrap_err();
            assert!(errors.has_field("rating"));
            assert!(!errors.has_field("title"));
        }
    }

    #[test]
    fn test_text_limits() {
        let errors =
            Post::validate(&json!({"title": "ok", "summary": "s".repeat(2001)}))
                .unwrap_err();
        assert!(errors.has_field("summary"));
        assert!(Post::validate(&json!({"title": "ok", "summary": "s".repeat(2000)})).is_ok());

        let errors =
            Post::validate(&json!({"title": "ok", "author": "a".repeat(101)}))
                .unwrap_err();
        assert!(errors.has_field("author"));
        assert!(Post::validate(&json!({"title": "ok", "author": "a".repeat(100)})).is_ok());
    }

    #[test]
    fn test_malformed_urls() {
        let errors =
            Post::validate(&json!({"title": "ok", "links": ["https://ok.example", "not a url"]}))
                .unwrap_err();
        assert!(errors.has_field("links"));
        assert!(!errors.has_field("image_urls"));

        let errors =
            Post::validate(&json!({"title": "ok", "image_urls": ["ftp://files.example/x.png"]}))
                .unwrap_err();
        assert!(errors.has_field("image_urls"));

        let errors = Post::validate(&json!({"title": "ok", "links": [7]})).unwrap_err();
        assert!(errors.has_field("links"));
    }

    #[test]
    fn test_urls_are_normalized() {
        let post = Post::validate(&json!({"title": "ok", "links": ["HTTPS://Example.COM"]}))
            .expect("valid post");
        assert_eq!(post.links, vec!["https://example.com/"]);
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let errors = Post::validate(&json!({
            "title": "A",
            "rating": 11,
            "links": ["nope"],
            "image_urls": ["also nope"],
            "genres": "action"
        }))
        .unwrap_err();

        for field in ["title", "rating", "links", "image_urls", "genres"] {
            assert!(errors.has_field(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_non_object_body() {
        let errors = Post::validate(&json!(["title"])).unwrap_err();
        assert!(errors.has_field("body"));
    }

    #[test]
    fn test_parse_http_url() {
        assert_eq!(
            parse_http_url("https://example.com/a?b=c").as_deref(),
            Ok("https://example.com/a?b=c")
        );
        assert!(parse_http_url("mailto:someone@example.com").is_err());
        assert!(parse_http_url("/relative/path").is_err());
        assert!(parse_http_url(&format!("https://example.com/{}", "a".repeat(2100))).is_err());
    }

    #[test]
    fn test_post_serialization() {
        let post = Post {
            title: "Solo Leveling".to_string(),
            summary: None,
            rating: Some(9.5),
            genres: vec!["action".to_string()],
            links: vec![],
            image_urls: vec![],
            image_data: vec![],
            author: None,
        };

        let json = serde_json::to_string(&post).expect("Failed to serialize post");
        let expected = r#"{"title":"Solo Leveling","summary":null,"rating":9.5,"genres":["action"],"links":[],"image_urls":[],"image_data":[],"author":null}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_post_deserialization_fills_missing_sequences() {
        let json = r#"{"title":"Solo Leveling","rating":9.5}"#;
        let post: Post = serde_json::from_str(json).expect("Failed to deserialize post");

        assert_eq!(post.title, "Solo Leveling");
        assert_eq!(post.rating, Some(9.5));
        assert!(post.genres.is_empty());
        assert!(post.image_data.is_empty());
    }
}
