//! Deterministic ordering of an API's methods for REST route registration.

use crate::domain::descriptor::MethodDescriptor;
use crate::routing::path_pattern::score_path;
use std::collections::BTreeMap;

/// Sort methods so the most specific path is registered first.
///
/// Order: path score descending, then path, HTTP method and method name
/// ascending.
pub fn sort_methods(
    methods: &BTreeMap<String, MethodDescriptor>,
) -> Vec<(&str, &MethodDescriptor)> {
    let mut sorted: Vec<(u64, &str, &MethodDescriptor)> = methods
        .iter()
        .map(|(name, method)| (score_path(&method.path), name.as_str(), method))
        .collect();

    sorted.sort_by(|(score_a, name_a, a), (score_b, name_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.http_method.cmp(&b.http_method))
            .then_with(|| name_a.cmp(name_b))
    });

    sorted
        .into_iter()
        .map(|(_, name, method)| (name, method))
        .collect()
}
