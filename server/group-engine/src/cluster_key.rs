//! Stable cluster keys for grouping events.

/// Cluster key for an event: `"{service}:{error_type}"`.
///
/// Both parts are trimmed; case is preserved so keys match what producers
/// and the summary engine already use.
pub fn compute(service: &str, error_type: &str) -> String {
  format!("{}:{}", service.trim(), error_type.trim())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_input_same_key() {
    assert_eq!(compute("user-api", "NullPointer"), compute("user-api", "NullPointer"));
  }

  #[test]
  fn key_trims_parts() {
    assert_eq!(compute(" payment-api ", "Timeout\n"), "payment-api:Timeout");
  }

  #[test]
  fn different_service_different_key() {
    assert_ne!(compute("order-api", "Timeout"), compute("user-profile", "Timeout"));
  }
}
