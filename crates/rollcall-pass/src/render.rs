use reqwest::Url;

use crate::payload::{AdmissionPass, PassError};

pub const DEFAULT_BASE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const DEFAULT_SIZE_PX: u32 = 250;

const MIN_SIZE_PX: u32 = 64;
const MAX_SIZE_PX: u32 = 1000;

/// Builds image links for a public QR rendering endpoint that takes
/// `size=<w>x<h>` and `data=<text>` query parameters.
#[derive(Debug, Clone)]
pub struct QrRenderer {
    base: Url,
    size_px: u32,
}

impl QrRenderer {
    pub fn new(base_url: &str, size_px: u32) -> Result<Self, PassError> {
        let base = Url::parse(base_url)
            .map_err(|e| PassError::InvalidRenderer(format!("{base_url}: {e}")))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(PassError::InvalidRenderer(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }
        if !(MIN_SIZE_PX..=MAX_SIZE_PX).contains(&size_px) {
            return Err(PassError::InvalidRenderer(format!(
                "size {size_px} outside {MIN_SIZE_PX}..={MAX_SIZE_PX}"
            )));
        }

        Ok(Self { base, size_px })
    }

    pub fn size_px(&self) -> u32 {
        self.size_px
    }

    /// Link to a PNG rendering of the pass.
    pub fn image_url(&self, pass: &AdmissionPass) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("size", &format!("{0}x{0}", self.size_px))
            .append_pair("data", &pass.payload());
        url.into()
    }
}

impl Default for QrRenderer {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_BASE_URL).expect("default renderer URL is valid"),
            size_px: DEFAULT_SIZE_PX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn image_url_encodes_payload() {
        let pass = AdmissionPass::new(Uuid::new_v4(), Uuid::new_v4());
        let url = QrRenderer::default().image_url(&pass);

        assert!(url.starts_with(DEFAULT_BASE_URL));
        assert!(url.contains("size=250x250"));
        assert!(url.contains(&format!("data={}%3A{}", pass.event_id, pass.user_id)));
    }

    #[test]
    fn keeps_existing_query_parameters() {
        let renderer = QrRenderer::new("https://qr.example.edu/render?ecc=M", 300).unwrap();
        let pass = AdmissionPass::new(Uuid::new_v4(), Uuid::new_v4());
        let url = renderer.image_url(&pass);

        assert!(url.starts_with("https://qr.example.edu/render?ecc=M&size=300x300&data="));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(QrRenderer::new("not a url", 250).is_err());
        assert!(QrRenderer::new("ftp://qr.example.edu/", 250).is_err());
        assert!(QrRenderer::new(DEFAULT_BASE_URL, 10).is_err());
        assert!(QrRenderer::new(DEFAULT_BASE_URL, 5000).is_err());
    }
}
