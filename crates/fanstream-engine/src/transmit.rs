//! Frame delivery.
//!
//! A [`FrameSink`] takes a finished frame and pushes it somewhere. The production sink is
//! [`HttpTransmitter`]: PNG-encode, then one blocking multipart POST to the device.
//!
//! Network trouble is never an `Err` here. A non-200 answer becomes
//! [`TransmitOutcome::Rejected`], anything that prevents an answer (refused, DNS, timeout)
//! becomes [`TransmitOutcome::Fault`], and the loop carries on either way. `Err` is reserved
//! for failing to encode the frame, which the loop treats as fatal.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use isahc::config::{Configurable, ExpectContinue};
use isahc::{HttpClient, Request};

use crate::codec::encode_png;
use crate::config::EndpointCfg;
use crate::error::EngineError;
use crate::frame::Frame;

/// What happened to one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitOutcome {
    /// HTTP 200.
    Delivered { bytes: usize, elapsed: Duration },
    /// Any other status code.
    Rejected { status: u16, bytes: usize, elapsed: Duration },
    /// No response at all.
    Fault { reason: String, elapsed: Duration },
}

impl TransmitOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransmitOutcome::Delivered { .. })
    }

    /// Status code when the device answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransmitOutcome::Delivered { .. } => Some(200),
            TransmitOutcome::Rejected { status, .. } => Some(*status),
            TransmitOutcome::Fault { .. } => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            TransmitOutcome::Delivered { elapsed, .. }
            | TransmitOutcome::Rejected { elapsed, .. }
            | TransmitOutcome::Fault { elapsed, .. } => *elapsed,
        }
    }
}

/// Destination for rendered frames.
pub trait FrameSink {
    fn transmit(&mut self, frame: &Frame) -> Result<TransmitOutcome, EngineError>;

    /// Human-readable destination for logs.
    fn describe(&self) -> String;
}

/// `multipart/form-data` body carrying a single file field.
#[derive(Debug, Clone)]
pub struct MultipartFile {
    boundary: String,
}

impl MultipartFile {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into() }
    }

    /// Boundary unique enough for one process: wall clock xor pid.
    pub fn with_random_boundary() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let tag = (now.as_nanos() as u64) ^ ((std::process::id() as u64) << 32);
        Self::new(format!("fanstream-{tag:016x}"))
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn body(&self, field: &str, file_name: &str, mime: &str, data: &[u8]) -> Vec<u8> {
        let head = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n",
            b = self.boundary
        );
        let tail = format!("\r\n--{}--\r\n", self.boundary);

        let mut out = Vec::with_capacity(head.len() + data.len() + tail.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(tail.as_bytes());
        out
    }
}

/// Uploads PNG frames to the device's upload route.
pub struct HttpTransmitter {
    client: HttpClient,
    url: String,
    field_name: String,
    file_name: String,
    multipart: MultipartFile,
}

impl HttpTransmitter {
    pub fn new(cfg: &EndpointCfg) -> Result<Self, EngineError> {
        let client = HttpClient::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.connect_timeout())
            // LAN device: never route through a system proxy
            .proxy(None::<isahc::http::Uri>)
            // small embedded servers rarely answer 100-continue; don't stall a frame on it
            .expect_continue(ExpectContinue::disabled())
            .build()
            .map_err(|e| EngineError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: cfg.url(),
            field_name: cfg.field_name.clone(),
            file_name: cfg.file_name.clone(),
            multipart: MultipartFile::with_random_boundary(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST of already-encoded PNG bytes. Blocks until answer, fault or timeout.
    pub fn post_png(&self, png: &[u8]) -> TransmitOutcome {
        let started = Instant::now();
        let body = self.multipart.body(&self.field_name, &self.file_name, "image/png", png);

        let request = match Request::post(self.url.as_str())
            .header("content-type", self.multipart.content_type())
            .body(body)
        {
            Ok(r) => r,
            Err(e) => {
                return TransmitOutcome::Fault {
                    reason: format!("invalid request for {}: {e}", self.url),
                    elapsed: started.elapsed(),
                }
            }
        };

        match self.client.send(request) {
            Ok(response) => {
                let status = response.status().as_u16();
                let elapsed = started.elapsed();
                if status == 200 {
                    TransmitOutcome::Delivered { bytes: png.len(), elapsed }
                } else {
                    TransmitOutcome::Rejected { status, bytes: png.len(), elapsed }
                }
            }
            Err(e) => TransmitOutcome::Fault {
                reason: e.to_string(),
                elapsed: started.elapsed(),
            },
        }
    }
}

impl FrameSink for HttpTransmitter {
    fn transmit(&mut self, frame: &Frame) -> Result<TransmitOutcome, EngineError> {
        let png = encode_png(frame)?;
        Ok(self.post_png(&png))
    }

    fn describe(&self) -> String {
        format!("POST {} (field '{}')", self.url, self.field_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_layout() {
        let mp = MultipartFile::new("XYZ");
        let body = mp.body("frame", "frame.png", "image/png", b"\x89PNG-data");
        let expected = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"frame\"; filename=\"frame.png\"\r\n\
Content-Type: image/png\r\n\r\n\
\x89PNG-data\r\n--XYZ--\r\n";
        assert_eq!(body, expected.to_vec());
        assert_eq!(mp.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn random_boundaries_have_a_stable_prefix() {
        let mp = MultipartFile::with_random_boundary();
        assert!(mp.boundary().starts_with("fanstream-"));
        assert_eq!(mp.boundary().len(), "fanstream-".len() + 16);
    }

    #[test]
    fn outcome_accessors() {
        let ok = TransmitOutcome::Delivered { bytes: 10, elapsed: Duration::from_millis(3) };
        let no = TransmitOutcome::Rejected { status: 404, bytes: 10, elapsed: Duration::ZERO };
        let fault = TransmitOutcome::Fault { reason: "refused".into(), elapsed: Duration::ZERO };
        assert!(ok.is_delivered());
        assert_eq!(ok.status(), Some(200));
        assert_eq!(no.status(), Some(404));
        assert!(!no.is_delivered());
        assert_eq!(fault.status(), None);
        assert_eq!(ok.elapsed(), Duration::from_millis(3));
    }
}
