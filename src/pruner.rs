use std::collections::BTreeSet;

use log::debug;

use crate::openapi_builder::OpenApiDocument;

/// Drop every definition that no operation reaches, directly or through other definitions.
///
/// A document without paths or without definitions is left untouched.
pub fn prune(document: &mut OpenApiDocument) {
    if document.paths.is_empty() {
        return;
    }
    let Some(schemas) = document.components.as_mut().and_then(|c| c.schemas.as_mut()) else {
        return;
    };

    let mut pending = BTreeSet::new();
    for operation in document.paths.values().flat_map(|item| item.operations()) {
        for schema in operation.schemas() {
            schema.collect_refs(&mut pending);
        }
    }

    let mut reachable = BTreeSet::new();
    while let Some(name) = pending.pop_first() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        if let Some(schema) = schemas.get(&name) {
            let mut refs = BTreeSet::new();
            schema.collect_refs(&mut refs);
            pending.extend(refs.into_iter().filter(|r| !reachable.contains(r)));
        }
    }

    let before = schemas.len();
    schemas.retain(|name, _| reachable.contains(name));
    debug!("Pruned {} unreachable definition(s)", before - schemas.len());
}
