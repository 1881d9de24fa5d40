//! The `radcoach validate` command.

use std::path::PathBuf;

use anyhow::Result;

use radcoach_core::parser;

pub fn execute(cases_path: PathBuf) -> Result<()> {
    let libraries = parser::load_case_libraries(&cases_path)?;

    let mut total_warnings = 0;

    for library in &libraries {
        println!("Case library: {} ({} cases)", library.name, library.cases.len());

        let warnings = parser::validate_case_library(library);
        for w in &warnings {
            let prefix = w
                .case_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All case libraries valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
