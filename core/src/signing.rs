use constant_time_eq::constant_time_eq;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use slb_protocol::RequestId;
use slb_protocol::ReviewDecision;
use slb_protocol::SessionId;
use slb_protocol::StructuredResponses;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("invalid session key length")]
pub struct SigningError(#[from] hmac::digest::InvalidLength);

/// The exact fields a signature covers, in the fixed order the canonical
/// encoding uses. Built from the request under review and the reviewer's
/// own decision, so the signature is meaningless if replayed against a
/// different request or flipped to a different decision.
pub struct SignablePayload<'a> {
    pub request_id: RequestId,
    pub reviewer_session_id: SessionId,
    pub decision: ReviewDecision,
    pub comments: &'a str,
    pub responses: &'a StructuredResponses,
}

impl SignablePayload<'_> {
    /// Deterministic, whitespace-free byte encoding of the fields above.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.request_id.to_string().as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.reviewer_session_id.to_string().as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.decision.to_string().as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.comments.as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.responses.reason.as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.responses.effect.as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.responses.goal.as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(self.responses.safety.as_bytes());
        buf
    }
}

/// Sign `payload` with `session_key`, returning the hex-encoded HMAC-SHA256.
pub fn sign(session_key: &str, payload: &SignablePayload<'_>) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(session_key.as_bytes())?;
    mac.update(&payload.canonical_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify `signature` against `session_key` and `payload` using a
/// constant-time comparison so a timing side channel can't leak how many
/// leading bytes of a forged signature matched.
pub fn verify(
    session_key: &str,
    payload: &SignablePayload<'_>,
    signature: &str,
) -> Result<bool, SigningError> {
    let expected = sign(session_key, payload)?;
    Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn payload(comments: &'static str) -> SignablePayload<'static> {
        SignablePayload {
            request_id: Uuid::nil().into(),
            reviewer_session_id: Uuid::nil().into(),
            decision: ReviewDecision::Approve,
            comments,
            responses: Box::leak(Box::new(StructuredResponses::default())),
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signature = sign("super-secret", &payload("looks fine")).expect("sign");
        assert!(verify("super-secret", &payload("looks fine"), &signature).expect("verify"));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let signature = sign("super-secret", &payload("looks fine")).expect("sign");
        assert!(!verify("wrong-key", &payload("looks fine"), &signature).expect("verify"));
    }

    #[test]
    fn verify_rejects_tampered_comments() {
        let signature = sign("super-secret", &payload("looks fine")).expect("sign");
        assert!(
            !verify("super-secret", &payload("looks sketchy"), &signature).expect("verify")
        );
    }
}
