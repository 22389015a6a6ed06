//! Seed URL list loading and validation.
//!
//! The crawl input is a newline-delimited file of absolute URLs. The whole
//! file is validated up front so that a malformed line fails the run before
//! any browser work or database writes happen.

use anyhow::{Context, Result, anyhow};
use std::path::Path;
use url::Url;

/// Validate that a single line is a syntactically valid absolute URL.
///
/// Relative URLs are rejected: `Url::parse` only succeeds on absolute
/// input, which is exactly the contract the crawl loop needs.
pub fn validate_absolute_url(line: &str) -> Result<Url> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty line"));
    }
    let url = Url::parse(trimmed).with_context(|| format!("invalid URL: {trimmed}"))?;
    if url.host_str().is_none() {
        return Err(anyhow!("URL has no host: {trimmed}"));
    }
    Ok(url)
}

/// Read and validate the seed URL list.
///
/// Blank lines are skipped; any other invalid line fails the whole read
/// with the offending line number in the error.
pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read URL list {}", path.display()))?;

    let mut urls = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let url = validate_absolute_url(line)
            .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
        urls.push(url.to_string());
    }

    if urls.is_empty() {
        return Err(anyhow!("URL list {} contains no URLs", path.display()));
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_http_urls() {
        assert!(validate_absolute_url("http://a.test/").is_ok());
        assert!(validate_absolute_url("  https://example.com/path?q=1  ").is_ok());
    }

    #[test]
    fn rejects_relative_and_junk() {
        assert!(validate_absolute_url("/relative/path").is_err());
        assert!(validate_absolute_url("not a url").is_err());
        assert!(validate_absolute_url("").is_err());
    }

    #[tokio::test]
    async fn reads_and_validates_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        tokio::fs::write(&path, "http://a.test/\n\nhttp://b.test/x\n")
            .await
            .unwrap();

        let urls = read_url_list(&path).await.unwrap();
        assert_eq!(urls, vec!["http://a.test/", "http://b.test/x"]);
    }

    #[tokio::test]
    async fn bad_line_fails_whole_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        tokio::fs::write(&path, "http://a.test/\nnot-a-url\n")
            .await
            .unwrap();

        let err = read_url_list(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("seeds.txt:2"));
    }
}
