pub fn getenv<T: std::str::FromStr>(s: &str, default: T) -> T {
    let s = s.to_uppercase();
    match std::env::var(&s) {
        Ok(v) => v.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!("ignoring unparsable value {v:?} for {s}");
            default
        }),
        Err(_) => default,
    }
}

pub fn getenv_flag(s: &str) -> bool {
    match std::env::var(s.to_uppercase()) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

fn shape_cache_size() -> usize {
    getenv("IR_SHAPE_CACHE_SIZE", 12288).max(1)
}

lazy_static::lazy_static! {
    /// Capacity of the process-wide shape cache, never zero.
    pub static ref SHAPE_CACHE_SIZE: usize = shape_cache_size();
    /// Keep verifying unchecked downcasts in optimized builds.
    pub static ref CHECKED_CAST: bool = cfg!(debug_assertions) || getenv_flag("IR_CHECKED_CAST");
}

pub fn prod(v: &[i64]) -> i64 {
    v.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getenv_parses_or_falls_back() {
        assert_eq!(getenv("SQUALL_TEST_UNSET_VAR", 7usize), 7);
        std::env::set_var("SQUALL_TEST_SIZE", " 64 ");
        assert_eq!(getenv("squall_test_size", 7usize), 64);
        std::env::set_var("SQUALL_TEST_BAD_SIZE", "lots");
        assert_eq!(getenv("SQUALL_TEST_BAD_SIZE", 7usize), 7);
    }

    #[test]
    fn getenv_flag_values() {
        assert!(!getenv_flag("SQUALL_TEST_UNSET_FLAG"));
        let cases = [
            ("1", true),
            ("TRUE", true),
            (" on ", true),
            ("yes", true),
            ("0", false),
            ("off", false),
            ("", false),
        ];
        for (v, expected) in cases {
            std::env::set_var("SQUALL_TEST_FLAG", v);
            assert_eq!(getenv_flag("SQUALL_TEST_FLAG"), expected, "{v:?}");
        }
    }

    #[test]
    fn shape_cache_size_is_clamped() {
        std::env::set_var("IR_SHAPE_CACHE_SIZE", "0");
        assert_eq!(shape_cache_size(), 1);
        std::env::set_var("IR_SHAPE_CACHE_SIZE", "32");
        assert_eq!(shape_cache_size(), 32);
        std::env::remove_var("IR_SHAPE_CACHE_SIZE");
        assert_eq!(shape_cache_size(), 12288);
    }
}
