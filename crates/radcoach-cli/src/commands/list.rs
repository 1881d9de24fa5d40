//! The `radcoach list` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use radcoach_core::parser;

pub fn execute(cases_path: PathBuf) -> Result<()> {
    let libraries = parser::load_case_libraries(&cases_path)?;

    for library in &libraries {
        println!("{} ({}, {} cases)", library.name, library.id, library.cases.len());

        let mut table = Table::new();
        table.set_header(vec![
            "Case",
            "Patient",
            "Expert findings",
            "Auxiliary",
            "Sample report",
        ]);
        for case in &library.cases {
            table.add_row(vec![
                Cell::new(&case.id),
                Cell::new(&case.patient_info),
                Cell::new(case.expert_findings.join(", ")),
                Cell::new(case.auxiliary_findings.join(", ")),
                Cell::new(if case.sample_report.is_some() { "yes" } else { "no" }),
            ]);
        }
        println!("{table}\n");
    }

    if libraries.is_empty() {
        println!("No case libraries found. Run `radcoach init` to create an example.");
    }

    Ok(())
}
