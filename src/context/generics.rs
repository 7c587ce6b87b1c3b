use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::trace;

use crate::{
    class::StructClass,
    context::{StructContext, inheritance::ClassResolver},
    signature::{GenericMap, GenericType, TypeArgument},
};

/// Type-variable bindings of every generic ancestor, keyed by class name.
pub type GenericHierarchy = HashMap<String, GenericMap>;

/// First non-empty mapping wins; an empty one may be upgraded later.
fn merge(hierarchy: &mut GenericHierarchy, class_name: &str, map: GenericMap) {
    match hierarchy.get_mut(class_name) {
        Some(existing) if existing.is_empty() => *existing = map,
        Some(_) => {}
        None => {
            hierarchy.insert(class_name.to_string(), map);
        }
    }
}

impl StructContext {
    /// Generic bindings seen from `class_name`, including its own type
    /// parameters. Memoised per class.
    pub fn all_generics(&self, class_name: &str) -> Arc<GenericHierarchy> {
        let mut visiting = HashSet::new();
        self.generics_guarded(class_name, &mut visiting)
    }

    fn generics_guarded(
        &self,
        class_name: &str,
        visiting: &mut HashSet<String>,
    ) -> Arc<GenericHierarchy> {
        if let Some(cached) = self.generics.get(class_name) {
            return Arc::clone(&cached);
        }
        if !visiting.insert(class_name.to_string()) {
            trace!("generic hierarchy of {class_name} is cyclic");
            return Arc::default();
        }
        let hierarchy = match self.resolve(class_name) {
            Some(class) => Arc::new(self.collect_generics(class, visiting)),
            None => Arc::default(),
        };
        self.generics.insert(class_name.to_string(), Arc::clone(&hierarchy));
        hierarchy
    }

    fn collect_generics(
        &self,
        class: &StructClass,
        visiting: &mut HashSet<String>,
    ) -> GenericHierarchy {
        let mut hierarchy = GenericHierarchy::new();
        let signature = class.signature();

        if let Some(signature) = signature.filter(|s| !s.type_parameters.is_empty()) {
            let own = signature
                .type_parameter_names()
                .map(|name| {
                    let variable = GenericType::TypeVariable(name.to_string());
                    (name.to_string(), TypeArgument::Exact(variable))
                })
                .collect();
            hierarchy.insert(class.qualified_name().to_string(), own);
        }

        let usages = class
            .super_class()
            .map(|name| (name, signature.map(|s| &s.superclass)))
            .into_iter()
            .chain(
                class
                    .interface_names()
                    .enumerate()
                    .map(|(i, name)| (name, signature.and_then(|s| s.superinterfaces.get(i)))),
            );

        let mut branches = Vec::new();
        for (ancestor_name, usage) in usages {
            let Some(ancestor) = self.resolve(ancestor_name) else {
                continue;
            };
            let direct = match (ancestor.signature(), usage) {
                (Some(generic), Some(usage)) => generic.generic_map(usage),
                _ => GenericMap::new(),
            };
            if ancestor
                .signature()
                .is_some_and(|s| !s.type_parameters.is_empty())
            {
                merge(&mut hierarchy, ancestor_name, direct.clone());
            }
            branches.push((ancestor_name, direct));
        }

        for (ancestor_name, direct) in branches {
            let inherited = self.generics_guarded(ancestor_name, visiting);
            for (name, map) in inherited.iter().filter(|(name, _)| *name != ancestor_name) {
                let substituted = map
                    .iter()
                    .map(|(variable, argument)| (variable.clone(), argument.substitute(&direct)))
                    .collect();
                merge(&mut hierarchy, name, substituted);
            }
        }
        hierarchy
    }
}
