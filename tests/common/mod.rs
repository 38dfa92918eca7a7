//! Shared fixtures for the integration tests: in-memory PDFs and PNGs, and a
//! scripted inference service that records every request it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_fbd2apdl::{
    GeneratorConfig, GeneratorConfigBuilder, InferenceRequest, InferenceResponse,
    InferenceService, Pipeline, RemoteInferenceError,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub const BEAM_PROBLEM: &str =
    "A beam of length 2m is fixed at one end with a 500N force at the free end";

pub const BEAM_SCRIPT: &str = "/PREP7\n\
ET,1,BEAM188\n\
MP,EX,1,200e9\n\
MP,PRXY,1,0.3\n\
N,1,0,0,0\n\
N,2,2,0,0\n\
E,1,2\n\
D,1,ALL,0\n\
F,2,FY,-500\n\
FINISH\n";

pub const FBD_DESCRIPTION: &str =
    "Cantilever, length 2 m, fixed support at A, downward point load 500 N at B.";

/// Build a PDF whose pages carry the given text; `None` pages have no text.
pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
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
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
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

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn beam_pdf() -> Vec<u8> {
    build_pdf(&[Some(BEAM_PROBLEM)])
}

/// A small valid PNG.
pub fn fbd_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Inference service answering from fixed strings: requests carrying an
/// image get the FBD description, all others get the script.
pub struct ScriptedService {
    pub description: String,
    pub script: String,
    pub fail_vision: Mutex<bool>,
    pub fail_text: Mutex<bool>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self {
            description: FBD_DESCRIPTION.to_string(),
            script: BEAM_SCRIPT.to_string(),
            fail_vision: Mutex::new(false),
            fail_text: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_vision() -> Arc<Self> {
        let svc = Self::new();
        *svc.fail_vision.lock().unwrap() = true;
        svc
    }

    pub fn failing_text() -> Arc<Self> {
        let svc = Self::new();
        *svc.fail_text.lock().unwrap() = true;
        svc
    }

    pub fn set_fail_text(&self, fail: bool) {
        *self.fail_text.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Prompt of the last request sent without an image.
    pub fn last_script_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.image.is_none())
            .map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl InferenceService for ScriptedService {
    fn provider_label(&self) -> &str {
        "scripted"
    }

    async fn infer(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, RemoteInferenceError> {
        let is_vision = request.image.is_some();
        self.requests.lock().unwrap().push(request);

        let fail = if is_vision {
            *self.fail_vision.lock().unwrap()
        } else {
            *self.fail_text.lock().unwrap()
        };
        if fail {
            return Err(RemoteInferenceError::Network {
                provider: "scripted".into(),
                detail: "connection reset".into(),
            });
        }

        let text = if is_vision {
            self.description.clone()
        } else {
            self.script.clone()
        };
        Ok(InferenceResponse {
            text,
            input_tokens: 100,
            output_tokens: 50,
        })
    }
}

/// Builder preloaded with `service` for both stages.
pub fn config_with(service: &Arc<ScriptedService>) -> GeneratorConfigBuilder {
    GeneratorConfig::builder().inference_service(Arc::clone(service) as Arc<dyn InferenceService>)
}

pub fn pipeline_with(service: &Arc<ScriptedService>, config: GeneratorConfig) -> Pipeline {
    let svc: Arc<dyn InferenceService> = Arc::clone(service) as Arc<dyn InferenceService>;
    Pipeline::with_services(config, Arc::clone(&svc), svc)
}
