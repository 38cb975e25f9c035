use serde::Serialize;

#[derive(Debug)]
pub struct FingerprintError(serde_json::Error);

impl std::fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request parameters are not serializable: {}", self.0)
    }
}

impl std::error::Error for FingerprintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Content hash of a request's serialized parameters.
///
/// Two requests share a fingerprint exactly when their JSON serializations are
/// byte-equal, so request types must serialize deterministically (struct field
/// order, `BTreeMap` for maps).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of<T: Serialize + ?Sized>(params: &T) -> Result<Self, FingerprintError> {
        let bytes = serde_json::to_vec(params).map_err(FingerprintError)?;
        Ok(Self(blake3::hash(&bytes).to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
