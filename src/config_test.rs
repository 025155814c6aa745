use super::*;

// =============================================================================
// env_parse: each test uses its own key since tests run in parallel.
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__TEST_CFG_NONEXISTENT_31337__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__TEST_CFG_VALID__", " 99 ") };
    let val: u32 = env_parse("__TEST_CFG_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__TEST_CFG_VALID__") };
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_CFG_INVALID__", "lots") };
    let val: f64 = env_parse("__TEST_CFG_INVALID__", 0.5);
    assert!((val - 0.5).abs() < f64::EPSILON);
    unsafe { std::env::remove_var("__TEST_CFG_INVALID__") };
}

#[test]
fn env_parse_float_gap() {
    unsafe { std::env::set_var("__TEST_CFG_GAP__", "1e-9") };
    let val: f64 = env_parse("__TEST_CFG_GAP__", 1.0);
    assert!((val - 1e-9).abs() < f64::EPSILON);
    unsafe { std::env::remove_var("__TEST_CFG_GAP__") };
}

// =============================================================================
// env_bool
// =============================================================================

#[test]
fn env_bool_variants() {
    for (i, (val, expected)) in [("1", true), ("YES", true), ("On", true), ("0", false), ("off", false)]
        .iter()
        .enumerate()
    {
        let key = format!("__TEST_CFG_BOOL_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(*expected), "value {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_invalid_or_unset_is_none() {
    unsafe { std::env::set_var("__TEST_CFG_BOOL_BAD__", "perhaps") };
    assert_eq!(env_bool("__TEST_CFG_BOOL_BAD__"), None);
    unsafe { std::env::remove_var("__TEST_CFG_BOOL_BAD__") };
    assert_eq!(env_bool("__TEST_CFG_BOOL_UNSET_4242__"), None);
}

#[test]
fn test_config_uses_defaults() {
    let config = Config::for_tests();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
    assert!(!config.cookie_secure);
}

#[test]
fn ttl_hours_clamped_to_positive_i32() {
    assert_eq!(clamp_ttl_hours(720), 720);
    assert_eq!(clamp_ttl_hours(0), 1);
    assert_eq!(clamp_ttl_hours(-5), 1);
    assert_eq!(clamp_ttl_hours(3_000_000_000_000_000), i32::MAX);
}
