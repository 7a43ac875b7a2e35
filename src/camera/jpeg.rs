use crate::core::errors::FetchError;

const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
const MARKUP_SIGNATURES: [&[u8]; 2] = [b"<html", b"<!DOCTYPE"];

/// Decide whether a fetched body is a genuine JPEG snapshot.
///
/// Camera endpoints that are offline tend to answer 200 with an HTML
/// placeholder page, so the markup check runs before the image-signature
/// check even when the content-type claimed otherwise.
pub fn classify_payload(body: &[u8]) -> Result<(), FetchError> {
    if MARKUP_SIGNATURES.iter().any(|sig| body.starts_with(sig)) {
        return Err(FetchError::NotAnImage);
    }
    if !body.starts_with(&JPEG_SOI) {
        return Err(FetchError::InvalidImageSignature);
    }
    Ok(())
}

/// True when a declared content-type names a markup page.
pub fn content_type_is_markup(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

#[cfg(test)]
mod tests {
    use crate::core::errors::FetchError;

    use super::{classify_payload, content_type_is_markup};

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xE0];
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    #[test]
    fn accepts_a_jpeg_body() {
        assert!(classify_payload(&fake_jpeg(b"frame-data")).is_ok());
    }

    #[test]
    fn rejects_html_page_body() {
        let err = classify_payload(b"<html><body>camera offline</body></html>")
            .expect_err("html should be rejected");
        assert!(matches!(err, FetchError::NotAnImage));
    }

    #[test]
    fn rejects_doctype_page_body() {
        let err = classify_payload(b"<!DOCTYPE html><html></html>")
            .expect_err("doctype should be rejected");
        assert!(matches!(err, FetchError::NotAnImage));
    }

    #[test]
    fn rejects_non_jpeg_binary() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let err = classify_payload(&png).expect_err("png should be rejected");
        assert!(matches!(err, FetchError::InvalidImageSignature));
    }

    #[test]
    fn rejects_empty_body() {
        let err = classify_payload(b"").expect_err("empty body should be rejected");
        assert!(matches!(err, FetchError::InvalidImageSignature));
    }

    #[test]
    fn markup_content_type_check_is_case_insensitive() {
        assert!(content_type_is_markup("Text/HTML; charset=utf-8"));
        assert!(!content_type_is_markup("image/jpeg"));
    }
}
