use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Generate a cryptographically secure random session token.
pub fn generate_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_token() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();

        assert_eq!(token1.len(), 64);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_alphanumeric()));
    }
}
