//! `zenform validate`: offline manifest checks.

use std::path::Path;

use zenform_core::Entity;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::manifest::{Bindings, Declarable, Declared, Manifest};
use crate::output;

pub fn handle(path: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    let manifest = Manifest::load(path)?;
    check(&manifest)?;
    output::print_output(
        &format!("{}: {} entities valid", path.display(), manifest.len()),
        global.quiet,
    );
    Ok(())
}

/// Bind every `name:` reference against the manifest itself and run the
/// local rules on each entry. Each failure is printed; the returned error
/// only carries the count.
pub fn check(manifest: &Manifest) -> Result<(), CliError> {
    let bindings = manifest.placeholder_bindings()?;
    let mut failed = 0;
    failed += check_all(&manifest.service_connectors, &bindings);
    failed += check_all(&manifest.workspaces, &bindings);
    failed += check_all(&manifest.teams, &bindings);
    failed += check_all(&manifest.components, &bindings);
    failed += check_all(&manifest.projects, &bindings);
    failed += check_all(&manifest.stacks, &bindings);
    failed += check_all(&manifest.role_assignments, &bindings);

    if failed > 0 {
        return Err(CliError::InvalidManifest { count: failed });
    }
    Ok(())
}

fn check_all<D: Declarable>(entries: &[Declared<D>], bindings: &Bindings) -> usize {
    let mut failed = 0;
    for entry in entries {
        if let Err(err) = check_one(&entry.spec, bindings) {
            eprintln!("{:?}", miette::Report::new(err));
            failed += 1;
        }
    }
    failed
}

fn check_one<D: Declarable>(spec: &D, bindings: &Bindings) -> Result<(), CliError> {
    let bound = spec.bind(bindings)?;
    D::Entity::validate(&bound).map_err(|source| CliError::InvalidEntry {
        kind: D::Entity::KIND,
        name: spec.label(),
        field: source.field(),
        reason: source.to_string(),
    })
}
