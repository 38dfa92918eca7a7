//! FBD interpretation: one vision call describing the diagram.

use crate::config::GeneratorConfig;
use crate::error::{Fbd2ApdlError, RemoteInferenceError};
use crate::pipeline::encode;
use crate::pipeline::inference::{InferenceRequest, InferenceResponse, InferenceService};
use crate::prompts::{FBD_SYSTEM_PROMPT, FBD_USER_PROMPT};
use crate::progress::Stage;
use tracing::{debug, info};

/// Describe the forces, dimensions and constraints shown in an FBD image.
///
/// The image is base64-encoded and sent with the fixed system and user
/// instructions; the model's text is returned verbatim. Unsupported image
/// formats fail before any remote call is made.
pub async fn interpret_fbd(
    service: &dyn InferenceService,
    image: &[u8],
    config: &GeneratorConfig,
) -> Result<InferenceResponse, Fbd2ApdlError> {
    let image_data = encode::encode_image(image)?;

    let request = InferenceRequest::text(FBD_USER_PROMPT, config.vision_max_tokens)
        .with_system(FBD_SYSTEM_PROMPT)
        .with_image(image_data)
        .with_temperature(config.vision_temperature);
    debug!("Vision request: {:?}", request);

    info!("Interpreting FBD image via {}", service.provider_label());
    let response = service.infer(request).await.map_err(remote)?;
    info!("FBD description: {} chars", response.text.len());
    Ok(response)
}

fn remote(source: RemoteInferenceError) -> Fbd2ApdlError {
    Fbd2ApdlError::RemoteInference {
        stage: Stage::Interpreting,
        source,
    }
}
