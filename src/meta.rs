//! Identity and ordering helpers shared by every resource wrapper (§4.1).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Builds the `"Kind/namespace/name"` identity string used as the key in
/// every map the core keeps (resources, hosts, problems).
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// Total ordering predicate for host/listener collisions (§4.1, §8):
/// the older `creationTimestamp` wins; on a tie the greater `uid`
/// (lexicographically) wins. `a` and `b` must be distinct resources for the
/// antisymmetry property to hold (a resource never competes with itself).
pub fn wins(a_created: Option<&Time>, a_uid: &str, b_created: Option<&Time>, b_uid: &str) -> bool {
    match (a_created, b_created) {
        (Some(a), Some(b)) => match a.0.cmp(&b.0) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => a_uid > b_uid,
        },
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => a_uid > b_uid,
    }
}
