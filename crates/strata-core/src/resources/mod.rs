pub mod quantities;

pub use quantities::{format_milli, parse_quantity};

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// A mapping from resource name (cpu, memory, ...) to a milli-unit value.
///
/// All capacity arithmetic happens here in 64-bit integers; percentage
/// scaling is `value * percent / 100`, truncating toward zero. Unknown
/// resource names are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceList(BTreeMap<String, i64>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, resource: &str) -> Option<i64> {
        self.0.get(resource).copied()
    }

    pub fn insert(&mut self, resource: impl Into<String>, milli: i64) {
        self.0.insert(resource.into(), milli);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add every entry of `other` into this list.
    pub fn add(&mut self, other: &ResourceList) {
        for (resource, milli) in &other.0 {
            *self.0.entry(resource.clone()).or_insert(0) += milli;
        }
    }

    /// Sum of `self + other` without mutating either.
    pub fn plus(&self, other: &ResourceList) -> ResourceList {
        let mut sum = self.clone();
        sum.add(other);
        sum
    }

    /// Build from a k8s-openapi quantity map (node allocatable, container
    /// requests). Entries that fail to parse contribute zero, matching the
    /// upstream convention that a node with a malformed or absent quantity
    /// simply adds nothing.
    pub fn from_quantity_map(map: &BTreeMap<String, Quantity>) -> Self {
        let mut list = ResourceList::new();
        for (resource, quantity) in map {
            let milli = parse_quantity(&quantity.0).unwrap_or(0);
            list.insert(resource.clone(), milli);
        }
        list
    }
}

impl FromIterator<(String, i64)> for ResourceList {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Sum the resource requests of every container in a pod.
pub fn pod_resource_requests(pod: &Pod) -> ResourceList {
    let mut total = ResourceList::new();

    let containers = match &pod.spec {
        Some(spec) => &spec.containers,
        None => return total,
    };

    for container in containers {
        if let Some(requests) = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
        {
            total.add(&ResourceList::from_quantity_map(requests));
        }
    }

    total
}
