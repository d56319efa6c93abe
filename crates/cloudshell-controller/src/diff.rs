//! Semantic equivalence between desired and live child objects
//!
//! A live object read back from the API server differs from what the
//! builders produce even when nothing has drifted: the server fills in
//! defaults, assigns bookkeeping metadata, and may reorder keyed lists.
//! Comparing raw values would patch every object on every pass.
//!
//! Both sides are serialized to JSON and normalized under a per-kind
//! [`DiffPolicy`] before comparison:
//!
//! 1. nulls are dropped
//! 2. ignored paths (server-populated or server-defaulted fields) are removed
//! 3. keyed lists are sorted by their key
//! 4. empty objects and arrays are pruned
//! 5. the live side is projected onto the shape of the desired side: object
//!    keys the desired side does not set are dropped at every depth
//!
//! The projection matches what a merge patch can correct. A key only the live
//! side carries (a label added by the platform, a `nodeSelector` set out of
//! band) survives any merge patch built from the desired object, so comparing
//! it would report drift forever. Lists are replaced wholesale by a merge
//! patch, so a list whose length differs is compared as is.
//!
//! Paths are dot-separated field names. A segment ending in `[]` descends
//! into every element of an array: `spec.template.spec.containers[].ports`.

use serde_json::{Map, Value};

use crate::resources::{ChildKind, ChildResource};
use crate::Error;

/// Fields the API server owns on every object
const COMMON_IGNORED: &[&str] = &[
    "apiVersion",
    "kind",
    "status",
    "metadata.uid",
    "metadata.resourceVersion",
    "metadata.generation",
    "metadata.creationTimestamp",
    "metadata.deletionTimestamp",
    "metadata.deletionGracePeriodSeconds",
    "metadata.managedFields",
    "metadata.selfLink",
    "metadata.finalizers",
    "metadata.ownerReferences",
    "metadata.generateName",
];

/// How to compare objects of one kind
#[derive(Clone, Copy, Debug)]
pub struct DiffPolicy {
    ignored: &'static [&'static str],
    sorted: &'static [(&'static str, &'static str)],
}

impl DiffPolicy {
    /// Policy for objects of `kind`
    pub fn for_kind(kind: ChildKind) -> Self {
        match kind {
            ChildKind::Deployment => DEPLOYMENT_POLICY,
            ChildKind::Service => SERVICE_POLICY,
            ChildKind::Route => ROUTE_POLICY,
            ChildKind::ServiceAccount => SERVICE_ACCOUNT_POLICY,
            ChildKind::Role | ChildKind::RoleBinding => RBAC_POLICY,
        }
    }

    /// Whether `desired` and `live` are equal after normalization
    pub fn equivalent(&self, desired: &Value, live: &Value) -> bool {
        let desired = self.normalize(desired);
        let mut live = self.normalize(live);
        project(&mut live, &desired);
        prune_empty(&mut live);
        desired == live
    }

    fn normalize(&self, value: &Value) -> Value {
        let mut value = strip_nulls(value.clone());
        for path in COMMON_IGNORED.iter().chain(self.ignored) {
            remove_path(&mut value, &segments(path));
        }
        for (path, key) in self.sorted {
            sort_path(&mut value, &segments(path), key);
        }
        prune_empty(&mut value);
        value
    }
}

const DEPLOYMENT_POLICY: DiffPolicy = DiffPolicy {
    ignored: &[
        "spec.revisionHistoryLimit",
        "spec.progressDeadlineSeconds",
        "spec.template.metadata.creationTimestamp",
        "spec.template.spec.dnsPolicy",
        "spec.template.spec.schedulerName",
        "spec.template.spec.serviceAccount",
        "spec.template.spec.restartPolicy",
        "spec.template.spec.securityContext",
        "spec.template.spec.containers[].terminationMessagePath",
        "spec.template.spec.containers[].terminationMessagePolicy",
        "spec.template.spec.containers[].imagePullPolicy",
    ],
    sorted: &[
        ("spec.template.spec.containers", "name"),
        ("spec.template.spec.volumes", "name"),
        ("spec.template.spec.containers[].ports", "name"),
        ("spec.template.spec.containers[].volumeMounts", "mountPath"),
    ],
};

const SERVICE_POLICY: DiffPolicy = DiffPolicy {
    ignored: &[
        "spec.clusterIP",
        "spec.clusterIPs",
        "spec.sessionAffinity",
        "spec.ipFamilies",
        "spec.ipFamilyPolicy",
        "spec.internalTrafficPolicy",
        "spec.ports[].targetPort",
    ],
    sorted: &[("spec.ports", "name")],
};

const ROUTE_POLICY: DiffPolicy = DiffPolicy {
    ignored: &["spec.wildcardPolicy", "spec.to.weight"],
    sorted: &[],
};

const SERVICE_ACCOUNT_POLICY: DiffPolicy = DiffPolicy {
    ignored: &["secrets", "imagePullSecrets"],
    sorted: &[],
};

const RBAC_POLICY: DiffPolicy = DiffPolicy {
    ignored: &[],
    sorted: &[],
};

/// Whether `live` already matches `desired` under the policy for their kind
pub fn equivalent(desired: &ChildResource, live: &ChildResource) -> Result<bool, Error> {
    if desired.kind() != live.kind() {
        return Ok(false);
    }
    let policy = DiffPolicy::for_kind(desired.kind());
    Ok(policy.equivalent(&desired.to_json()?, &live.to_json()?))
}

enum Segment<'a> {
    Field(&'a str),
    Each(&'a str),
}

fn segments(path: &str) -> Vec<Segment<'_>> {
    path.split('.')
        .map(|s| match s.strip_suffix("[]") {
            Some(field) => Segment::Each(field),
            None => Segment::Field(s),
        })
        .collect()
}

/// Apply `f` to the object holding the last segment, for every match of the
/// leading segments.
fn visit_parents(value: &mut Value, segs: &[Segment<'_>], f: &mut dyn FnMut(&mut Map<String, Value>, &str)) {
    let Some((last, rest)) = segs.split_last() else {
        return;
    };
    let last = match last {
        Segment::Field(f) | Segment::Each(f) => *f,
    };
    visit(value, rest, &mut |v| {
        if let Value::Object(map) = v {
            f(map, last);
        }
    });
}

fn visit(value: &mut Value, segs: &[Segment<'_>], f: &mut dyn FnMut(&mut Value)) {
    let Some((head, rest)) = segs.split_first() else {
        f(value);
        return;
    };
    match head {
        Segment::Field(name) => {
            if let Some(child) = value.get_mut(*name) {
                visit(child, rest, f);
            }
        }
        Segment::Each(name) => {
            if let Some(Value::Array(items)) = value.get_mut(*name) {
                for item in items {
                    visit(item, rest, f);
                }
            }
        }
    }
}

fn remove_path(value: &mut Value, segs: &[Segment<'_>]) {
    visit_parents(value, segs, &mut |map, field| {
        map.remove(field);
    });
}

fn sort_path(value: &mut Value, segs: &[Segment<'_>], key: &str) {
    visit_parents(value, segs, &mut |map, field| {
        if let Some(Value::Array(items)) = map.get_mut(field) {
            items.sort_by(|a, b| sort_key(a, key).cmp(&sort_key(b, key)));
        }
    });
}

fn sort_key(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Drop every key of `live` the desired side does not set, recursing into
/// objects and into lists of equal length.
fn project(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => {
            live.retain(|k, _| desired.contains_key(k));
            for (k, v) in live.iter_mut() {
                if let Some(d) = desired.get(k) {
                    project(v, d);
                }
            }
        }
        (Value::Array(live), Value::Array(desired)) if live.len() == desired.len() => {
            for (l, d) in live.iter_mut().zip(desired) {
                project(l, d);
            }
        }
        _ => {}
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn prune_empty(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for v in map.values_mut() {
                prune_empty(v);
            }
            map.retain(|_, v| !is_empty(v));
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                prune_empty(v);
            }
        }
        _ => {}
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
