/// Failures reported by the WiZ device client.
#[derive(Debug, thiserror::Error)]
pub enum WizError {
    #[error("The request to the bulb timed out")]
    Timeout,

    #[error("Failed to reach the bulb: {0}")]
    Connection(#[source] std::io::Error),

    #[error("Bulb model {0} is not in the bulb library")]
    NotKnownBulb(String),

    #[error("Bulb returned error {code}: {message}")]
    Device { code: i64, message: String },

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}
