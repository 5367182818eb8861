//! Decides what happens to a response before the caller sees it.

use crate::gateway::ApiRequest;
use crate::settings::Endpoints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response to the caller as-is.
    Pass,
    /// Already replayed once; surface the failure.
    Reject,
    /// A valid token was refused: the user lacks the role.
    Deny,
    /// Renew the access token, then replay.
    Refresh,
}

fn is_auth_endpoint(path: &str, endpoints: &Endpoints) -> bool {
    [&endpoints.login, &endpoints.refresh, &endpoints.logout]
        .iter()
        .any(|endpoint| path == endpoint.as_str())
}

/// `bearer_live` is whether the token attached to this request was decodable
/// and unexpired when it was sent.
pub fn classify(status: u16, request: &ApiRequest, bearer_live: bool, endpoints: &Endpoints) -> Verdict {
    if !matches!(status, 401 | 403) || is_auth_endpoint(&request.path, endpoints) {
        return Verdict::Pass;
    }
    if request.retried {
        return Verdict::Reject;
    }
    if status == 403 && bearer_live {
        return Verdict::Deny;
    }
    Verdict::Refresh
}
