use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::class::{StructClass, member::StructMethod};

/// Looks classes up by qualified name.
pub trait ClassResolver {
    fn resolve(&self, name: &str) -> Option<&StructClass>;
}

impl ClassResolver for HashMap<String, Arc<StructClass>> {
    fn resolve(&self, name: &str) -> Option<&StructClass> {
        self.get(name).map(Arc::as_ref)
    }
}

impl ClassResolver for HashMap<String, StructClass> {
    fn resolve(&self, name: &str) -> Option<&StructClass> {
        self.get(name)
    }
}

/// Whether `value` is `reference` or one of its subclasses or implementors.
///
/// Ancestors that cannot be resolved end their branch of the search.
pub fn instance_of<R: ClassResolver + ?Sized>(resolver: &R, value: &str, reference: &str) -> bool {
    let mut visited = HashSet::new();
    is_same_or_sub_class_of(resolver, value, reference, &mut visited)
}

fn is_same_or_sub_class_of<'a, R: ClassResolver + ?Sized>(
    resolver: &'a R,
    value: &'a str,
    reference: &str,
    visited: &mut HashSet<&'a str>,
) -> bool {
    if value == reference {
        return true;
    }
    if !visited.insert(value) {
        return false;
    }
    let Some(class) = resolver.resolve(value) else {
        return false;
    };
    class
        .super_class()
        .into_iter()
        .chain(class.interface_names())
        .any(|ancestor| is_same_or_sub_class_of(resolver, ancestor, reference, visited))
}

/// Finds a method on `class` or the closest ancestor declaring it, super
/// classes before interfaces.
pub fn method_recursive<'a, R: ClassResolver + ?Sized>(
    resolver: &'a R,
    class: &'a StructClass,
    name: &str,
    descriptor: &str,
) -> Option<&'a StructMethod> {
    let mut visited = HashSet::new();
    find_method(resolver, class, name, descriptor, &mut visited)
}

fn find_method<'a, R: ClassResolver + ?Sized>(
    resolver: &'a R,
    class: &'a StructClass,
    name: &str,
    descriptor: &str,
    visited: &mut HashSet<&'a str>,
) -> Option<&'a StructMethod> {
    if !visited.insert(class.qualified_name()) {
        return None;
    }
    if let Some(method) = class.method(name, descriptor) {
        return Some(method);
    }
    class
        .super_class()
        .into_iter()
        .chain(class.interface_names())
        .filter_map(|ancestor| resolver.resolve(ancestor))
        .find_map(|ancestor| find_method(resolver, ancestor, name, descriptor, visited))
}
