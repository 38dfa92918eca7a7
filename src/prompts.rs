//! Fixed prompts for FBD interpretation and APDL script synthesis.
//!
//! Every instruction sent to a remote model lives here so prompt changes
//! touch one file and tests can inspect the exact text without a provider.

use serde::{Deserialize, Serialize};

/// System instruction for the vision call.
pub const FBD_SYSTEM_PROMPT: &str =
    "Extract forces, dimensions, and constraints from this Free Body Diagram (FBD).";

/// User instruction sent alongside the FBD image.
pub const FBD_USER_PROMPT: &str = "Analyze this FBD and describe its contents.";

/// Opening instruction of the synthesis prompt.
pub const SCRIPT_PREAMBLE: &str = "Based on the following problem description and Free Body \
Diagram (FBD) data, generate an ANSYS APDL script. The response must contain only the script \
code, with no other text, commentary, or explanations, and must not be wrapped in ``` code \
fences.";

/// Heading that introduces the list of mandatory sections.
pub const SECTIONS_HEADING: &str = "The ANSYS APDL script should include:";

/// The four sections every generated script must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptSection {
    MaterialProperties,
    NodesAndElements,
    BoundaryConditions,
    Loads,
}

impl ScriptSection {
    /// All sections, in the order they appear in the prompt.
    pub const ALL: [ScriptSection; 4] = [
        ScriptSection::MaterialProperties,
        ScriptSection::NodesAndElements,
        ScriptSection::BoundaryConditions,
        ScriptSection::Loads,
    ];

    /// Bullet text used in the synthesis prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            ScriptSection::MaterialProperties => "Material properties",
            ScriptSection::NodesAndElements => "Nodes and elements",
            ScriptSection::BoundaryConditions => "Boundary conditions",
            ScriptSection::Loads => "Forces or loads",
        }
    }
}

/// Build the single-turn synthesis prompt.
///
/// The FBD block is only present when a non-blank description is given;
/// the preamble and the four section bullets are always present.
pub fn build_script_prompt(problem_text: &str, fbd_description: Option<&str>) -> String {
    let mut prompt = String::with_capacity(problem_text.len() + 512);
    prompt.push_str(SCRIPT_PREAMBLE);
    prompt.push_str("\n\nProblem Description:\n");
    prompt.push_str(problem_text);
    prompt.push_str("\n\n");

    if let Some(fbd) = fbd_description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str("FBD Data (Extracted from image):\n");
        prompt.push_str(fbd);
        prompt.push_str("\n\n");
    }

    prompt.push_str(SECTIONS_HEADING);
    for section in ScriptSection::ALL {
        prompt.push_str("\n- ");
        prompt.push_str(section.instruction());
    }
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_always_lists_every_section() {
        for problem in ["", "A beam of length 2m", "ÜNICODE ∑ text"] {
            let prompt = build_script_prompt(problem, None);
            for section in ScriptSection::ALL {
                assert!(
                    prompt.contains(&format!("- {}", section.instruction())),
                    "missing {:?} for {problem:?}",
                    section
                );
            }
            assert!(prompt.contains(SCRIPT_PREAMBLE));
        }
    }

    #[test]
    fn prompt_omits_fbd_block_without_description() {
        let prompt = build_script_prompt("beam", None);
        assert!(!prompt.contains("FBD Data"));

        let blank = build_script_prompt("beam", Some("   "));
        assert!(!blank.contains("FBD Data"));
    }

    #[test]
    fn prompt_embeds_fbd_description() {
        let prompt = build_script_prompt("beam", Some("500 N downward at x = 2 m"));
        let fbd_at = prompt.find("FBD Data").unwrap();
        let sections_at = prompt.find(SECTIONS_HEADING).unwrap();
        assert!(prompt.contains("500 N downward at x = 2 m"));
        assert!(fbd_at < sections_at);
        assert!(prompt.find("Problem Description:").unwrap() < fbd_at);
    }

    #[test]
    fn preamble_forbids_prose_and_fences() {
        assert!(SCRIPT_PREAMBLE.contains("only the script"));
        assert!(SCRIPT_PREAMBLE.contains("```"));
    }
}
