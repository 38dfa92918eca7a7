//! Script diagnostics: read-only checks on the generated APDL text.
//!
//! Models sometimes disobey the prompt: they wrap the script in code fences,
//! add a chatty preamble, or skip a section. The script is delivered
//! verbatim regardless; these checks only report what looks wrong so the
//! caller can decide whether to regenerate.
//!
//! Each mandatory section is recognised by the APDL command families that
//! implement it:
//!
//! | Section | Commands |
//! |---------|----------|
//! | Material properties | `MP`, `MPDATA`, `TB` |
//! | Nodes and elements | `N`, `E`, `ET`, `K`, `L`, `*MESH` |
//! | Boundary conditions | `D`, `DK`, `DL`, `DA` |
//! | Forces or loads | `F`, `FK`, `SF*`, `BF`, `ACEL` |

use crate::prompts::ScriptSection;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something about a generated script that deserves a second look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptWarning {
    /// The model returned only whitespace.
    Empty,
    /// The script contains a ``` fence line.
    CodeFence { line: usize },
    /// No command implementing this section was found.
    MissingSection(ScriptSection),
}

impl fmt::Display for ScriptWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptWarning::Empty => f.write_str("script is empty"),
            ScriptWarning::CodeFence { line } => {
                write!(f, "code fence on line {line} (script is not plain APDL)")
            }
            ScriptWarning::MissingSection(section) => {
                write!(f, "no commands found for section '{}'", section.instruction())
            }
        }
    }
}

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").unwrap());

static RE_MATERIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*(MP|MPDATA|TB)\s*,").unwrap());

static RE_MESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^\s*(N|E|ET|K|L|NGEN|EGEN|FILL|LMESH|AMESH|VMESH|ESIZE)\s*,").unwrap()
});

static RE_CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*(D|DK|DL|DA|DSYM)\s*,").unwrap());

static RE_LOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*(F|FK|SF|SFE|SFL|SFA|SFBEAM|BF|ACEL)\s*,").unwrap());

fn section_pattern(section: ScriptSection) -> &'static Regex {
    match section {
        ScriptSection::MaterialProperties => &*RE_MATERIAL,
        ScriptSection::NodesAndElements => &*RE_MESH,
        ScriptSection::BoundaryConditions => &*RE_CONSTRAINT,
        ScriptSection::Loads => &*RE_LOAD,
    }
}

/// Check a generated script without modifying it.
pub fn lint_script(script: &str) -> Vec<ScriptWarning> {
    if script.trim().is_empty() {
        return vec![ScriptWarning::Empty];
    }

    let mut warnings: Vec<ScriptWarning> = script
        .lines()
        .enumerate()
        .filter(|(_, line)| RE_FENCE.is_match(line))
        .map(|(i, _)| ScriptWarning::CodeFence { line: i + 1 })
        .collect();

    warnings.extend(
        ScriptSection::ALL
            .into_iter()
            .filter(|s| !section_pattern(*s).is_match(script))
            .map(ScriptWarning::MissingSection),
    );

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANTILEVER: &str = "/PREP7
ET,1,BEAM188
MP,EX,1,200E9
MP,PRXY,1,0.3
N,1,0,0,0
N,2,2,0,0
E,1,2
D,1,ALL,0
F,2,FY,-500
FINISH
/SOLU
SOLVE
";

    #[test]
    fn complete_script_has_no_warnings() {
        assert!(lint_script(CANTILEVER).is_empty());
    }

    #[test]
    fn lowercase_and_indented_commands_count() {
        let script = "  mp,ex,1,2e11\n n,1\n d,1,all\n f,1,fx,10\n";
        assert!(lint_script(script).is_empty());
    }

    #[test]
    fn fences_are_reported_with_line_numbers() {
        let script = format!("```apdl\n{CANTILEVER}```\n");
        let warnings = lint_script(&script);
        assert_eq!(
            warnings,
            vec![
                ScriptWarning::CodeFence { line: 1 },
                ScriptWarning::CodeFence { line: 14 },
            ]
        );
    }

    #[test]
    fn missing_loads_are_reported() {
        let script = "MP,EX,1,2e11\nN,1\nD,1,ALL\n";
        assert_eq!(
            lint_script(script),
            vec![ScriptWarning::MissingSection(ScriptSection::Loads)]
        );
    }

    #[test]
    fn prose_reports_every_section() {
        let warnings = lint_script("Here is your script: I could not do it.");
        assert_eq!(warnings.len(), 4);
        assert!(warnings
            .iter()
            .all(|w| matches!(w, ScriptWarning::MissingSection(_))));
    }

    #[test]
    fn empty_script() {
        assert_eq!(lint_script("  \n "), vec![ScriptWarning::Empty]);
    }

    #[test]
    fn display_is_readable() {
        let w = ScriptWarning::MissingSection(ScriptSection::BoundaryConditions);
        assert!(w.to_string().contains("Boundary conditions"));
    }
}
