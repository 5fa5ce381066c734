//! Client signature verification and persistence.

use tracing::debug;
use tracing::warn;

use serde_json::Value;

use crate::context::CallerId;
use crate::frontend::RpcFrontend;
use crate::signed_req::SignedReq;
use crate::store::Transaction;

impl RpcFrontend {
    /// Verify the signed envelope `full_rpc` and persist the accepted
    /// record as the caller's latest signed request.
    ///
    /// Forwarded requests skip verification (the forwarding follower
    /// already verified) but are still persisted. When request storing is
    /// disabled the signed content is cleared before persisting.
    ///
    /// Returns the persisted record, or `None` when verification is not
    /// possible (no client-signatures map) or the signature is rejected.
    pub fn verify_client_signature(
        &self,
        tx: &mut dyn Transaction,
        caller_cert: &[u8],
        caller_id: CallerId,
        full_rpc: &Value,
        raw_input: &[u8],
        is_forwarded: bool,
    ) -> Option<SignedReq> {
        let client_signatures = self.client_signatures_map()?;

        let mut signed_request = match SignedReq::from_envelope(full_rpc, raw_input) {
            Ok(signed_request) => signed_request,
            Err(err) => {
                warn!(caller_id, %err, "malformed signed envelope");
                return None;
            }
        };

        if !is_forwarded {
            let verifier = match self
                .verifier_cache()
                .lock()
                .get_or_create(caller_id, caller_cert)
            {
                Ok(verifier) => verifier,
                Err(err) => {
                    warn!(caller_id, %err, "failed to build request verifier");
                    return None;
                }
            };
            if !verifier.verify(&signed_request.req, &signed_request.sig) {
                debug!(caller_id, "client signature rejected");
                return None;
            }
        }

        if self.request_storing_disabled() {
            signed_request.req.clear();
        }

        let mut view = client_signatures.view(tx);
        if let Err(err) = view.put(&caller_id, &signed_request) {
            warn!(caller_id, %err, "failed to persist signed request");
            return None;
        }
        Some(signed_request)
    }

    /// Latest persisted signed request for `caller_id`, if any.
    pub fn get_signed_req(&self, caller_id: CallerId) -> Option<SignedReq> {
        let client_signatures = self.client_signatures_map()?;
        let mut tx = self.store().begin();
        let mut view = client_signatures.view(tx.as_mut());
        view.get(&caller_id).ok().flatten()
    }
}
