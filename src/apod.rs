use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

const IMAGE_MEDIA_TYPE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApodRecord {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    #[serde(default)]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ApodRecord {
    pub fn is_image(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(IMAGE_MEDIA_TYPE)
    }

    /// Best available image URL: `hdurl`, then `url`.
    pub fn source_url(&self) -> Result<&str> {
        self.hdurl
            .as_deref()
            .or(self.url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("APOD entry for {} has no image url", self.date))
    }
}

/// Same picture as last time? Compares `hdurl` when both records have one,
/// otherwise `url`.
pub fn same_source(old: &ApodRecord, new: &ApodRecord) -> bool {
    if let (Some(old_hd), Some(new_hd)) = (&old.hdurl, &new.hdurl) {
        return old_hd == new_hd;
    }
    if let (Some(old_url), Some(new_url)) = (&old.url, &new.url) {
        return old_url == new_url;
    }
    false
}

pub fn fetch_record(endpoint: &str, api_key: &str) -> Result<ApodRecord> {
    let client = reqwest::blocking::Client::new();
    debug!("fetching APOD metadata from {}", endpoint);
    let response = client
        .get(endpoint)
        .query(&[("api_key", api_key)])
        .send()
        .with_context(|| "could not get data from server")?;
    let status = response.status();
    let text = response
        .text()
        .with_context(|| "failed to read APOD response body")?;
    if !status.is_success() {
        return Err(anyhow!(
            "APOD API error ({}): {}",
            status,
            extract_api_error(&text).unwrap_or(text)
        ));
    }
    parse_record(&text)
}

pub fn parse_record(text: &str) -> Result<ApodRecord> {
    serde_json::from_str(text).with_context(|| "failed to parse APOD response")
}

/// Downloads `url` into a temp file inside `dest_dir`, keeping the URL's
/// extension so the decoder can guess the format.
pub fn download(url: &str, dest_dir: &Path) -> Result<NamedTempFile> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("failed to create download dir: {}", dest_dir.display()))?;
    let client = reqwest::blocking::Client::new();
    debug!("downloading {}", url);
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("could not download image: {}", url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("could not download image ({}): {}", status, url));
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read image body: {}", url))?;
    store_download(&bytes, url, dest_dir)
}

fn store_download(bytes: &[u8], url: &str, dest_dir: &Path) -> Result<NamedTempFile> {
    let suffix = format!(".{}", file_extension(url));
    let mut file = tempfile::Builder::new()
        .prefix("apod_")
        .suffix(&suffix)
        .tempfile_in(dest_dir)
        .with_context(|| "failed to create temp file for download")?;
    file.write_all(bytes)
        .with_context(|| "failed to write downloaded image")?;
    file.flush()
        .with_context(|| "failed to flush downloaded image")?;
    Ok(file)
}

pub(crate) fn file_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "img".to_string())
}

fn extract_api_error(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let error = value.get("error").unwrap_or(&value);
    error
        .get("message")
        .or_else(|| error.get("msg"))
        .and_then(|message| message.as_str())
        .map(|message| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    /// Answers a single HTTP request with `response` and hangs up.
    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/planetary/apod", addr)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn fixture() -> ApodRecord {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/apod_response.json"
        ));
        parse_record(payload).expect("fixture")
    }

    fn record(hdurl: Option<&str>, url: Option<&str>) -> ApodRecord {
        ApodRecord {
            hdurl: hdurl.map(str::to_string),
            url: url.map(str::to_string),
            ..fixture()
        }
    }

    #[test]
    fn parses_fixture_and_ignores_unknown_fields() {
        let record = fixture();
        assert_eq!(record.title, "The Pillars of Creation");
        assert_eq!(record.date, "2025-12-29");
        assert!(record.is_image());
        assert_eq!(
            record.source_url().unwrap(),
            "https://apod.nasa.gov/apod/image/2512/Pillars_Webb_4000.jpg"
        );
    }

    #[test]
    fn video_entries_are_not_images() {
        let video = parse_record(
            r#"{"date":"2025-12-30","media_type":"video","title":"Spin","url":"https://youtu.be/x"}"#,
        )
        .unwrap();
        assert!(!video.is_image());
        assert_eq!(video.hdurl, None);
    }

    #[test]
    fn source_url_falls_back_to_url() {
        assert_eq!(record(None, Some("b.png")).source_url().unwrap(), "b.png");
        assert!(record(None, None).source_url().is_err());
    }

    #[test]
    fn same_source_prefers_hdurl() {
        let a = record(Some("hd.jpg"), Some("a.jpg"));
        let b = record(Some("hd.jpg"), Some("b.jpg"));
        assert!(same_source(&a, &b));
        let c = record(Some("other.jpg"), Some("a.jpg"));
        assert!(!same_source(&a, &c));
    }

    #[test]
    fn same_source_uses_url_when_hdurl_missing() {
        let a = record(None, Some("a.jpg"));
        assert!(same_source(&a, &record(Some("hd.jpg"), Some("a.jpg"))));
        assert!(!same_source(&a, &record(None, Some("b.jpg"))));
        assert!(!same_source(&record(None, None), &record(None, None)));
    }

    #[test]
    fn extension_comes_from_url_path() {
        assert_eq!(file_extension("https://x.gov/a/b/Pic.JPG"), "jpg");
        assert_eq!(file_extension("https://x.gov/a/pic.png?size=2"), "png");
        assert_eq!(file_extension("https://x.gov/v1.2/pic"), "img");
        assert_eq!(file_extension("https://x.gov/pic.averylongext"), "img");
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error":{"code":"API_KEY_INVALID","message":"An invalid api_key was supplied."}}"#;
        assert_eq!(
            extract_api_error(body).as_deref(),
            Some("An invalid api_key was supplied.")
        );
        assert_eq!(extract_api_error(r#"{"msg":"bad date"}"#).as_deref(), Some("bad date"));
        assert_eq!(extract_api_error("<html>"), None);
    }

    #[test]
    fn fetch_parses_served_record() {
        let body = r#"{"date":"2025-12-29","media_type":"image","title":"M31","url":"https://x/m31.jpg"}"#;
        let endpoint = serve_once(http_response("200 OK", body));
        let record = fetch_record(&endpoint, "DEMO_KEY").expect("fetch");
        assert_eq!(record.title, "M31");
    }

    #[test]
    fn fetch_surfaces_api_error_message() {
        let body = r#"{"error":{"code":"API_KEY_INVALID","message":"An invalid api_key was supplied."}}"#;
        let endpoint = serve_once(http_response("403 Forbidden", body));
        let err = fetch_record(&endpoint, "nope").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("403"), "{}", message);
        assert!(message.contains("An invalid api_key was supplied."), "{}", message);
    }

    #[test]
    fn truncated_body_is_a_read_error_not_a_parse_error() {
        let response =
            "HTTP/1.1 200 OK\r\nContent-Length: 400\r\nConnection: close\r\n\r\n{\"title\"".to_string();
        let endpoint = serve_once(response);
        let err = fetch_record(&endpoint, "DEMO_KEY").unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to read APOD response body"), "{}", message);
        assert!(!message.contains("failed to parse"), "{}", message);
    }

    #[test]
    fn stored_download_keeps_extension_and_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = store_download(b"jpegdata", "https://x.gov/a/Pic.JPG?x=1", dir.path())
            .expect("store");
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("apod_") && name.ends_with(".jpg"), "{}", name);
        assert_eq!(fs::read(file.path()).expect("read"), b"jpegdata");
    }

    #[test]
    fn storing_into_missing_dir_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("gone");
        assert!(store_download(b"x", "https://x.gov/a.png", &missing).is_err());
    }
}
