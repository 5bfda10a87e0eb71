//! Challenge Bridge (§2, §4.2 step 1): lifts a cert-manager HTTP-01 solver
//! ingress into a `VirtualServerRoute` fragment attached to the VS that
//! owns its host, instead of letting it compete for the host itself.

use k8s_openapi::api::networking::v1::Ingress;

use crate::resources::ingress::is_challenge_ingress;
use crate::resources::virtual_server::{RouteAction, RouteEntry, RouteSource, Upstream};

pub const CHALLENGE_UPSTREAM_NAME: &str = "challenge";

/// Returns the synthesised route and upstream if `challenge_ingress` is a
/// solver ingress targeting `host` with a numeric backend port. Named
/// service ports can't be resolved here — that requires a Service lookup,
/// which is an out-of-scope collaborator (§1) — so those are skipped
/// (§4.2: the ingress then falls back to being processed normally).
pub fn synthesize(host: &str, challenge_ingress: &Ingress) -> Option<(RouteEntry, Upstream)> {
    if !is_challenge_ingress(challenge_ingress) {
        return None;
    }
    let rule = challenge_ingress
        .spec
        .as_ref()?
        .rules
        .as_ref()?
        .iter()
        .find(|r| r.host.as_deref() == Some(host))?;
    let path = rule.http.as_ref()?.paths.first()?;
    let service = path.backend.service.as_ref()?;
    let port = service.port.as_ref()?.number?;

    let upstream = Upstream {
        name: CHALLENGE_UPSTREAM_NAME.to_string(),
        service: service.name.clone(),
        port,
    };
    let route = RouteEntry {
        path: path.path.clone().unwrap_or_default(),
        action: RouteAction::Pass {
            upstream: CHALLENGE_UPSTREAM_NAME.to_string(),
        },
        source: RouteSource::Challenge,
    };
    Some((route, upstream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_challenge_ingress;

    #[test]
    fn synthesizes_single_pass_route() {
        let ingress = build_challenge_ingress(
            "default",
            "cm-acme-http-solver-xyz",
            "foo.com",
            "/.well-known/acme-challenge/X",
            "solver",
            "solver-uid",
            1,
        );
        let (route, upstream) = synthesize("foo.com", &ingress).expect("should synthesize");
        assert_eq!(route.path, "/.well-known/acme-challenge/X");
        assert_eq!(route.source, RouteSource::Challenge);
        assert_eq!(upstream.name, CHALLENGE_UPSTREAM_NAME);
        assert_eq!(upstream.service, "solver");
        assert_eq!(upstream.port, 80);
    }

    #[test]
    fn non_challenge_ingress_is_skipped() {
        let ingress = crate::test_support::build_ingress("default", "regular", &[("foo.com", "/", "svc")]);
        assert!(synthesize("foo.com", &ingress).is_none());
    }

    #[test]
    fn wrong_host_is_skipped() {
        let ingress = build_challenge_ingress(
            "default",
            "cm-acme-http-solver-xyz",
            "foo.com",
            "/.well-known/acme-challenge/X",
            "solver",
            "solver-uid",
            1,
        );
        assert!(synthesize("bar.com", &ingress).is_none());
    }
}
