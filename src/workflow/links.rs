use url::Url;

use super::token::Decision;
use super::Intent;
use crate::models::approval::RequestKind;
use crate::models::user::ActorTier;

/// Route path (without the token segment) that resolves the given intent.
pub fn link_path(kind: RequestKind, tier: ActorTier, decision: Decision) -> &'static str {
    use ActorTier::*;
    use Decision::*;
    use RequestKind::*;

    match (kind, tier, decision) {
        (UserRegistration, Admin, Approve) => "/user/approve",
        (UserRegistration, Admin, Deny) => "/user/deny",
        (UserRegistration, SuperAdmin, Approve) => "/user/super/approve",
        (UserRegistration, SuperAdmin, Deny) => "/user/super/deny",
        (ScrapRequest, Admin, Approve) => "/scrap/approve",
        (ScrapRequest, Admin, Deny) => "/scrap/deny",
        (ScrapRequest, SuperAdmin, Approve) => "/scrap/super-approve",
        (ScrapRequest, SuperAdmin, Deny) => "/scrap/super-deny",
        (NewChemicalRequest, Admin, Approve) => "/newChemical/approve",
        (NewChemicalRequest, Admin, Deny) => "/newChemical/deny",
        (NewChemicalRequest, SuperAdmin, Approve) => "/newChemical/super-approve",
        (NewChemicalRequest, SuperAdmin, Deny) => "/newChemical/super-deny",
    }
}

/// Every link route paired with the intent it is bound to.
pub fn link_routes() -> Vec<(&'static str, Intent)> {
    let mut routes = Vec::with_capacity(12);
    for kind in RequestKind::ALL {
        for tier in [ActorTier::Admin, ActorTier::SuperAdmin] {
            for decision in [Decision::Approve, Decision::Deny] {
                let intent = Intent { kind, tier, decision };
                routes.push((link_path(kind, tier, decision), intent));
            }
        }
    }
    routes
}

/// Builds absolute action links against the public base URL.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn url(&self, intent: Intent, token: &str) -> String {
        let path = format!(
            "{}/{}",
            link_path(intent.kind, intent.tier, intent.decision),
            token
        );
        match self.base.join(&path) {
            Ok(url) => url.to_string(),
            // join only fails on a base that cannot hold a path
            Err(_) => format!("{}{}", self.base.as_str().trim_end_matches('/'), path),
        }
    }
}
