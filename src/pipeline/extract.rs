//! PDF text extraction via lopdf.
//!
//! The problem statement is parsed from memory and each page's text layer is
//! read in document order. A page whose text cannot be read (scanned image,
//! unsupported font encoding, broken content stream) contributes an empty
//! string: "no text" is not the same failure as "not a PDF", and only the
//! latter is an error.
//!
//! lopdf ends every text object with a line break, so each page loses its
//! trailing line breaks before the pages are joined with `\n`. Leading
//! indentation and interior whitespace inside a page are kept. Pages holding
//! only whitespace count as pages without text and are skipped; the joined
//! result is trimmed once at the end.

use crate::error::Fbd2ApdlError;
use lopdf::Document;
use tracing::{debug, info, warn};

/// Text pulled out of a problem-statement PDF.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtractedDocument {
    /// Per-page text joined by `\n` and trimmed, pages without text skipped.
    pub text: String,
    /// Number of pages in the document.
    pub page_count: usize,
    /// Number of pages that contributed text.
    pub text_pages: usize,
}

/// Whether the bytes start with the `%PDF` header.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}

/// Extract the text of every page, joined by newline.
///
/// Convenience wrapper over [`extract_document_blocking`] for unencrypted
/// documents.
pub fn extract_text(bytes: &[u8]) -> Result<String, Fbd2ApdlError> {
    extract_document_blocking(bytes, None).map(|doc| doc.text)
}

/// Extract page text on the blocking thread pool.
///
/// lopdf parsing is CPU-bound; running it in `spawn_blocking` keeps the
/// async executor responsive while a large document is decoded.
pub async fn extract_document(
    bytes: &[u8],
    password: Option<&str>,
) -> Result<ExtractedDocument, Fbd2ApdlError> {
    let owned = bytes.to_vec();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_document_blocking(&owned, pwd.as_deref()))
        .await
        .map_err(|e| Fbd2ApdlError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
pub fn extract_document_blocking(
    bytes: &[u8],
    password: Option<&str>,
) -> Result<ExtractedDocument, Fbd2ApdlError> {
    if !has_pdf_magic(bytes) {
        let shown = &bytes[..bytes.len().min(4)];
        return Err(Fbd2ApdlError::UnreadableDocument {
            detail: format!("missing %PDF header (first bytes: {:?})", shown),
        });
    }

    let mut document = Document::load_mem(bytes).map_err(|e| Fbd2ApdlError::UnreadableDocument {
        detail: e.to_string(),
    })?;

    if document.is_encrypted() {
        decrypt(&mut document, password)?;
    }

    let pages = document.get_pages();
    let page_count = pages.len();
    info!("PDF loaded: {} pages", page_count);

    let mut texts: Vec<String> = Vec::with_capacity(page_count);
    for &page_num in pages.keys() {
        let page_text = match document.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {}: no extractable text ({})", page_num, e);
                String::new()
            }
        };

        if page_text.trim().is_empty() {
            debug!("Page {}: empty, skipped", page_num);
            continue;
        }
        let page_text = page_text.trim_end_matches(['\n', '\r']);
        debug!("Page {}: {} chars", page_num, page_text.len());
        texts.push(page_text.to_string());
    }

    let text_pages = texts.len();
    let text = texts.join("\n").trim().to_string();

    Ok(ExtractedDocument {
        text,
        page_count,
        text_pages,
    })
}

/// Decrypt in place, trying the empty user password when none was given.
fn decrypt(document: &mut Document, password: Option<&str>) -> Result<(), Fbd2ApdlError> {
    match password {
        Some(pwd) => document
            .decrypt(pwd)
            .map_err(|_| Fbd2ApdlError::WrongPassword),
        None => document
            .decrypt("")
            .map_err(|_| Fbd2ApdlError::PasswordRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::encryption::{decrypt_object, get_encryption_key};
    use lopdf::{dictionary, Object, Stream, StringFormat};

    /// Build an in-memory PDF; `None` pages carry graphics but no text.
    fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        save(build_document(pages))
    }

    fn build_document(pages: &[Option<&str>]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let operations = match page {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![
                    Operation::new("re", vec![10.into(), 10.into(), 100.into(), 100.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Password padding string of the standard security handler.
    const PAD: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut s: Vec<u8> = (0..=255).collect();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|b| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(s[i as usize]);
                s.swap(i as usize, j as usize);
                b ^ s[s[i as usize].wrapping_add(s[j as usize]) as usize]
            })
            .collect()
    }

    /// Encrypt with the 40-bit RC4 standard handler (V1/R2) under
    /// `user_password`.
    fn encrypt(doc: &mut Document, user_password: &str) {
        let file_id = Object::String(b"fbd2apdl-test-id".to_vec(), StringFormat::Hexadecimal);
        doc.trailer
            .set("ID", Object::Array(vec![file_id.clone(), file_id]));
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "P" => -4,
            "O" => Object::String(vec![0x4F; 32], StringFormat::Hexadecimal),
        });
        doc.trailer.set("Encrypt", encrypt_id);

        let key = get_encryption_key(doc, user_password, false).unwrap();
        let check = rc4(&key, &PAD);
        doc.get_object_mut(encrypt_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("U", Object::String(check, StringFormat::Hexadecimal));

        // RC4 is symmetric: decrypting plaintext encrypts it.
        for (&id, obj) in doc.objects.iter_mut() {
            if id == encrypt_id {
                continue;
            }
            if let Ok(cipher) = decrypt_object(&key, id, obj) {
                match obj {
                    Object::Stream(stream) => stream.set_content(cipher),
                    Object::String(content, _) => *content = cipher,
                    _ => {}
                }
            }
        }
    }

    fn encrypted_pdf(text: &str, user_password: &str) -> Vec<u8> {
        let mut doc = build_document(&[Some(text)]);
        encrypt(&mut doc, user_password);
        save(doc)
    }

    #[test]
    fn pages_joined_in_document_order() {
        let pdf = build_pdf(&[Some("A"), Some("B")]);
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "A\nB");
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.text_pages, 2);
    }

    #[test]
    fn text_bearing_document_is_non_empty() {
        let pdf = build_pdf(&[Some(
            "A beam of length 2m is fixed at one end with a 500N force at the free end",
        )]);
        let text = extract_text(&pdf).unwrap();
        assert!(text.contains("500N"), "got: {text:?}");
        assert_eq!(text, text.trim());
    }

    #[test]
    fn image_only_document_yields_empty_string() {
        let pdf = build_pdf(&[None, None]);
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "");
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.text_pages, 0);
    }

    #[test]
    fn empty_pages_are_skipped() {
        let pdf = build_pdf(&[Some("first"), None, Some("third")]);
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "first\nthird");
        assert_eq!(doc.text_pages, 2);
    }

    #[test]
    fn garbage_is_unreadable() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Fbd2ApdlError::UnreadableDocument { .. }));
    }

    #[test]
    fn truncated_pdf_is_unreadable() {
        let err = extract_text(b"%PDF-1.5\n%garbage with no xref").unwrap_err();
        assert!(matches!(err, Fbd2ApdlError::UnreadableDocument { .. }));
    }

    #[test]
    fn empty_input_is_unreadable() {
        assert!(matches!(
            extract_text(&[]),
            Err(Fbd2ApdlError::UnreadableDocument { .. })
        ));
    }

    #[test]
    fn indentation_inside_a_page_is_kept() {
        let pdf = build_pdf(&[Some("first"), Some("    MP,EX,1,200e9")]);
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "first\n    MP,EX,1,200e9");
    }

    #[test]
    fn whitespace_only_page_is_skipped() {
        let pdf = build_pdf(&[Some("first"), Some("   "), Some("third")]);
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "first\nthird");
        assert_eq!(doc.text_pages, 2);
    }

    #[test]
    fn empty_user_password_decrypts_without_prompting() {
        let pdf = encrypted_pdf("open sesame", "");
        let doc = extract_document_blocking(&pdf, None).unwrap();
        assert_eq!(doc.text, "open sesame");
    }

    #[test]
    fn encrypted_without_password_requires_one() {
        let pdf = encrypted_pdf("beam", "secret");
        let err = extract_document_blocking(&pdf, None).unwrap_err();
        assert!(matches!(err, Fbd2ApdlError::PasswordRequired), "got: {err}");
    }

    #[test]
    fn encrypted_with_wrong_password_is_rejected() {
        let pdf = encrypted_pdf("beam", "secret");
        let err = extract_document_blocking(&pdf, Some("guess")).unwrap_err();
        assert!(matches!(err, Fbd2ApdlError::WrongPassword), "got: {err}");
    }

    #[test]
    fn encrypted_with_right_password_is_extracted() {
        let pdf = encrypted_pdf("A 500N load at the free end", "secret");
        let doc = extract_document_blocking(&pdf, Some("secret")).unwrap();
        assert_eq!(doc.text, "A 500N load at the free end");
    }

    #[tokio::test]
    async fn async_extraction_matches_blocking() {
        let pdf = build_pdf(&[Some("A"), Some("B")]);
        let doc = extract_document(&pdf, None).await.unwrap();
        assert_eq!(doc.text, "A\nB");
    }
}
