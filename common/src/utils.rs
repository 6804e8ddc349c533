pub mod paging {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pagination {
        pub page: u64,
        pub limit: u64,
    }

    impl Pagination {
        /// Lenient parse of raw query values; anything that is not a positive
        /// integer falls back to the default. `limit` is capped at `max_limit`.
        pub fn parse(page: Option<&str>, limit: Option<&str>, max_limit: u64) -> Self {
            Self {
                page: positive(page).unwrap_or(DEFAULT_PAGE),
                limit: positive(limit).unwrap_or(DEFAULT_LIMIT).min(max_limit.max(1)),
            }
        }

        pub fn offset(&self) -> u64 {
            (self.page - 1).saturating_mul(self.limit)
        }
    }

    fn positive(raw: Option<&str>) -> Option<u64> {
        raw?.trim().parse::<u64>().ok().filter(|n| *n > 0)
    }

}

pub mod password {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
    use argon2::Argon2;

    pub fn hash(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string())
    }

    /// False on mismatch and on a hash that does not parse.
    pub fn verify(password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

}

/// Case folding shared by stored search columns and query parameters.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}
