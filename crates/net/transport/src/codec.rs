use bytes::Bytes;
use tracing::warn;

use crate::envelope::Envelope;
use crate::error::CodecError;

/// Encoded envelopes above this size are logged; the transport may fragment or drop them.
pub const MAX_PAYLOAD_WARN_BYTES: usize = 31_500;

/// JSON codec for [`Envelope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    pub fn encode(&self, envelope: &Envelope) -> Result<Bytes, CodecError> {
        let bytes = serde_json::to_vec(envelope).map_err(CodecError::Encode)?;
        if bytes.len() > MAX_PAYLOAD_WARN_BYTES {
            warn!(
                id = %envelope.id.short(),
                size = bytes.len(),
                limit = MAX_PAYLOAD_WARN_BYTES,
                "envelope exceeds recommended size"
            );
        }
        Ok(Bytes::from(bytes))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_decode_garbage() {
        let codec = EnvelopeCodec;
        assert_matches!(codec.decode(b""), Err(CodecError::Empty));
        assert_matches!(codec.decode(b"not json"), Err(CodecError::Decode(_)));
        assert_matches!(
            codec.decode(br#"{"marker":"discovery-request"}"#),
            Err(CodecError::Decode(_))
        );
    }

    #[test]
    fn test_oversized_envelope_still_encodes() {
        let codec = EnvelopeCodec;
        let big = "x".repeat(MAX_PAYLOAD_WARN_BYTES + 1);
        let envelope = Envelope::application(serde_json::Value::String(big));

        let bytes = codec.encode(&envelope).unwrap();
        assert!(bytes.len() > MAX_PAYLOAD_WARN_BYTES);
        assert_eq!(codec.decode(&bytes).unwrap(), envelope);
    }
}
