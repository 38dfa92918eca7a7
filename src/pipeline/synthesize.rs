//! Script synthesis: one text call that writes the APDL script.

use crate::config::GeneratorConfig;
use crate::error::Fbd2ApdlError;
use crate::pipeline::inference::{InferenceRequest, InferenceResponse, InferenceService};
use crate::prompts::build_script_prompt;
use crate::progress::Stage;
use tracing::{debug, info};

/// Build the synthesis request for the given inputs.
///
/// Split out so the exact request can be inspected without a provider.
pub fn script_request(
    problem_text: &str,
    fbd_description: Option<&str>,
    config: &GeneratorConfig,
) -> InferenceRequest {
    InferenceRequest::text(
        build_script_prompt(problem_text, fbd_description),
        config.max_tokens,
    )
    .with_temperature(Some(config.temperature))
}

/// Generate the APDL script body and return the model's text verbatim.
pub async fn synthesize_script(
    service: &dyn InferenceService,
    problem_text: &str,
    fbd_description: Option<&str>,
    config: &GeneratorConfig,
) -> Result<InferenceResponse, Fbd2ApdlError> {
    let request = script_request(problem_text, fbd_description, config);
    debug!("Synthesis request: {:?}", request);

    info!("Synthesizing APDL script via {}", service.provider_label());
    let response = service
        .infer(request)
        .await
        .map_err(|source| Fbd2ApdlError::RemoteInference {
            stage: Stage::Synthesizing,
            source,
        })?;
    info!("Script: {} chars", response.text.len());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::ScriptSection;

    #[test]
    fn request_uses_configured_ceiling_and_temperature() {
        let config = GeneratorConfig::default();
        let req = script_request("beam", None, &config);
        assert_eq!(req.max_tokens, 1000);
        assert_eq!(req.temperature, Some(0.5));
        assert!(req.system.is_none());
        assert!(req.image.is_none());
    }

    #[test]
    fn request_prompt_is_independent_of_content_for_sections() {
        let config = GeneratorConfig::default();
        for problem in ["", "truss", "plate with hole"] {
            let req = script_request(problem, None, &config);
            for section in ScriptSection::ALL {
                assert!(req.prompt.contains(section.instruction()));
            }
        }
    }
}
