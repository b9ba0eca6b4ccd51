use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ORIGIN;

use super::{FetchError, FetchMode, ImageFetcher};

const USER_AGENT: &str = concat!("memeforge/", env!("CARGO_PKG_VERSION"));

/// Default fetcher: `data:` URLs, local files and `http(s)` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    fn fetch_http(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        if mode == FetchMode::Anonymous {
            // No cookies are ever attached; the opaque origin marks the
            // request as a credential-less cross-origin fetch.
            request = request.header(ORIGIN, "null");
        }
        let response = request
            .send()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url, mode);
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        read_local_file(Path::new(path))
    }
}

pub(crate) fn decode_data_url(url: &str) -> Result<Vec<u8>, FetchError> {
    let data_url = data_url::DataUrl::process(url)
        .map_err(|err| FetchError::InvalidDataUrl(format!("{err:?}")))?;
    let (body, _fragment) = data_url
        .decode_to_vec()
        .map_err(|err| FetchError::InvalidDataUrl(format!("{err:?}")))?;
    Ok(body)
}

fn read_local_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|err| FetchError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_decode_base64_payloads() {
        let bytes = decode_data_url("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        let err = decode_data_url("data:nonsense").unwrap_err();
        assert!(matches!(err, FetchError::InvalidDataUrl(_)));
    }

    #[test]
    fn local_paths_and_file_urls_read_from_disk() {
        let dir = std::env::temp_dir().join(format!("memeforge-fetch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        std::fs::write(&path, [1_u8, 2, 3]).unwrap();

        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let plain = fetcher
            .fetch(path.to_str().unwrap(), FetchMode::Anonymous)
            .unwrap();
        let file_url = fetcher
            .fetch(&format!("file://{}", path.display()), FetchMode::Unrestricted)
            .unwrap();
        assert_eq!(plain, vec![1, 2, 3]);
        assert_eq!(file_url, plain);

        let missing = fetcher
            .fetch(dir.join("missing.png").to_str().unwrap(), FetchMode::Anonymous)
            .unwrap_err();
        assert!(matches!(missing, FetchError::Io { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }
}
