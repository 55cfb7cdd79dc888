//! Source image acquisition over HTTP
//!
//! Downloads happen with a fixed timeout, an http/https scheme allow-list,
//! and a payload size cap. The raw downloaded bytes are kept alongside the
//! decoded image so the original can be echoed back verbatim.

use crate::error::{BgServeError, Result};
use image::{DynamicImage, ImageFormat};
use reqwest::{Client, Url};
use std::time::Duration;

/// A downloaded and decoded source image
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Decoded in-memory image
    pub image: DynamicImage,
    /// The untouched downloaded bytes
    pub bytes: Vec<u8>,
    /// Detected source format tag ("PNG" when undetectable)
    pub format: &'static str,
}

/// HTTP image fetcher with fixed timeout and size cap
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl ImageFetcher {
    /// Create a fetcher with the given timeout and payload cap
    ///
    /// # Errors
    /// - Failed to construct the HTTP client
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BgServeError::invalid_config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, max_bytes })
    }

    /// Download and decode an image from a URL
    ///
    /// # Errors
    /// - `InvalidRequest` for unparseable URLs or disallowed schemes
    /// - `Download` for transport errors, non-success statuses, timeouts,
    ///   and oversized payloads (the size cap is enforced while the body
    ///   streams in, so it also bounds memory)
    /// - `Image` when the payload is not a decodable image
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let parsed = Url::parse(url)
            .map_err(|e| BgServeError::invalid_request(format!("invalid image_url '{url}': {e}")))?;
        validate_scheme(&parsed)?;

        tracing::debug!(%url, "downloading source image");
        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| BgServeError::download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BgServeError::download(format!(
                "HTTP status {status} fetching {url}"
            )));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        // The declared length may be absent (chunked transfer); enforce the
        // cap as the body arrives so it bounds memory, not just the final
        // payload
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BgServeError::download(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64)?;
        }

        let format = detect_format(&bytes);
        let image = image::load_from_memory(&bytes)?;
        tracing::debug!(
            size_bytes = bytes.len(),
            format,
            width = image.width(),
            height = image.height(),
            "source image decoded"
        );

        Ok(FetchedImage {
            image,
            bytes,
            format,
        })
    }

    fn check_size(&self, length: u64) -> Result<()> {
        if length > self.max_bytes {
            return Err(BgServeError::download(format!(
                "payload of {length} bytes exceeds limit of {} bytes",
                self.max_bytes
            )));
        }
        Ok(())
    }
}

fn validate_scheme(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(BgServeError::invalid_request(format!(
            "unsupported URL scheme '{other}' in image_url"
        ))),
    }
}

/// Detect the source image format from its magic bytes
///
/// Falls back to "PNG" when the format cannot be determined, matching the
/// tag used for the processed output.
pub fn detect_format(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format_tag(format),
        Err(_) => "PNG",
    }
}

fn format_tag(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Gif => "GIF",
        _ => "PNG",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fetcher() -> ImageFetcher {
        ImageFetcher::new(Duration::from_secs(2), 1024 * 1024).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let err = fetcher()
            .fetch("file:///etc/passwd")
            .await
            .expect_err("file scheme must be rejected");
        assert!(matches!(err, BgServeError::InvalidRequest(_)));
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_url() {
        let err = fetcher()
            .fetch("not a url")
            .await
            .expect_err("garbage must be rejected");
        assert!(matches!(err, BgServeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_download_error() {
        // Port 1 on loopback is not listening; the transport error text
        // must surface in the download error
        let err = fetcher()
            .fetch("http://127.0.0.1:1/image.png")
            .await
            .expect_err("unreachable host must fail");
        assert!(matches!(err, BgServeError::Download(_)));
        assert!(err
            .to_string()
            .starts_with("Failed to download image:"));
    }

    #[tokio::test]
    async fn test_chunked_body_over_cap_is_rejected() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // A chunked response carries no Content-Length, so only the
        // incremental check can stop it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await;
            let chunk = [b'x'; 1024];
            for _ in 0..8 {
                let _ = stream.write_all(b"400\r\n").await;
                let _ = stream.write_all(&chunk).await;
                let _ = stream.write_all(b"\r\n").await;
            }
            let _ = stream.write_all(b"0\r\n\r\n").await;
        });

        let fetcher = ImageFetcher::new(Duration::from_secs(2), 2048).unwrap();
        let err = fetcher
            .fetch(&format!("http://{addr}/large.bin"))
            .await
            .expect_err("oversized chunked body must fail");
        assert!(matches!(err, BgServeError::Download(_)));
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_size_cap() {
        let fetcher = ImageFetcher::new(Duration::from_secs(1), 100).unwrap();
        assert!(fetcher.check_size(100).is_ok());
        let err = fetcher.check_size(101).expect_err("over cap must fail");
        assert!(matches!(err, BgServeError::Download(_)));
    }

    #[test]
    fn test_detect_format() {
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();
        assert_eq!(detect_format(png.get_ref()), "PNG");

        let mut jpeg = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(detect_format(jpeg.get_ref()), "JPEG");

        assert_eq!(detect_format(b"definitely not an image"), "PNG");
    }
}
