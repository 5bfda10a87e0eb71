//! Validators are supplied at construction (see §9 Design Notes) and the
//! core never interprets their output beyond "error occurred" + a human
//! message attached to the rejected resource.

/// A single-resource-kind validator. Implementations live in the
/// out-of-scope "configs module" in a full deployment; the core only needs
/// the trait boundary and a permissive default so it is usable standalone.
pub trait Validator<T> {
    fn validate(&self, resource: &T) -> Result<(), String>;
}

/// Accepts everything. Used as the default so a `Store` can be constructed
/// without wiring in real CRD validators.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;

impl<T> Validator<T> for NoopValidator {
    fn validate(&self, _resource: &T) -> Result<(), String> {
        Ok(())
    }
}

/// The ingress-class filter (§6): objects the predicate rejects are evicted
/// from the store as if deleted.
pub trait IngressClassFilter<T> {
    fn matches(&self, resource: &T) -> bool;
}

/// Accepts everything. Suitable for tests and for callers that filter by
/// ingress class further upstream, before resources reach the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllIngressClassFilter;

impl<T> IngressClassFilter<T> for AllowAllIngressClassFilter {
    fn matches(&self, _resource: &T) -> bool {
        true
    }
}
