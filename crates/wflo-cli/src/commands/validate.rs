use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;
use wflo_cli::config::ProblemFile;
use wflo_core::{Category, Diagnostics};

/// Check every section of a problem file and report all issues at once.
pub fn handle(problem: &Path) -> Result<()> {
    let file = ProblemFile::load(problem)?;
    let mut diag = Diagnostics::new();

    let checks: [(Category, Result<()>); 5] = [
        (Category::Turbine, file.turbine_model().map(drop)),
        (Category::Site, file.wind_resource().map(drop)),
        (Category::Wake, file.evaluator(None).map(drop)),
        (Category::Layout, file.seed_layout().map(drop)),
        (Category::Boundary, file.boundary().map(drop)),
    ];
    for (category, result) in checks {
        if let Err(err) = result {
            diag.error(category, &format!("{:#}", err));
        }
    }

    if !diag.has_errors() {
        match file.build_problem() {
            Ok(layout_problem) => {
                let seed = layout_problem.seed_layout().to_flat();
                let start = layout_problem.evaluate_point(&seed)?;
                info!(
                    "{} turbines, {} constraints, seed AEP {:.2} GWh/year",
                    layout_problem.num_turbines(),
                    layout_problem.constraints().num_constraints(),
                    start.aep_gwh()
                );
                diag.merge(layout_problem.diagnostics().clone());
            }
            Err(err) => diag.error(Category::Problem, &format!("{:#}", err)),
        }
    }

    for issue in &diag.issues {
        println!("{}", issue);
    }
    println!("Validation of {}: {}", problem.display(), diag.summary());

    if diag.has_errors() {
        bail!("{} is not a usable layout problem", problem.display());
    }
    Ok(())
}
