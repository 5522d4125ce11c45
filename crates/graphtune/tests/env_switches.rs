use graphtune::{AutotuneOptions, GraphCacheConfig, caching::DEFAULT_GRAPH_CACHE_CAPACITY};
use graphtune_env::{DETERMINISTIC_OPS, DISABLE_REDZONE_CHECK, GRAPH_CACHE_SIZE};
use serial_test::serial;

#[test]
#[serial]
fn autotune_options_follow_the_environment_at_each_read() {
    let _deterministic = DETERMINISTIC_OPS.scoped_unset();
    let _redzone = DISABLE_REDZONE_CHECK.scoped_unset();
    assert_eq!(AutotuneOptions::from_env(), AutotuneOptions::default());

    {
        let _on = DETERMINISTIC_OPS.scoped(&true);
        let _off = DISABLE_REDZONE_CHECK.scoped(&true);
        let options = AutotuneOptions::from_env();
        assert!(options.deterministic);
        assert!(!options.redzone_check);
    }

    let _junk = DETERMINISTIC_OPS.scoped_raw("sometimes");
    assert!(!AutotuneOptions::from_env().deterministic);
}

#[test]
#[serial]
fn graph_cache_size_is_read_and_clamped() {
    {
        let _unset = GRAPH_CACHE_SIZE.scoped_unset();
        assert_eq!(GraphCacheConfig::from_env().capacity, DEFAULT_GRAPH_CACHE_CAPACITY);
    }
    {
        let _five = GRAPH_CACHE_SIZE.scoped(&5);
        assert_eq!(GraphCacheConfig::from_env().capacity, 5);
    }
    {
        let _zero = GRAPH_CACHE_SIZE.scoped(&0);
        assert_eq!(GraphCacheConfig::from_env().capacity, 1);
    }
    let _junk = GRAPH_CACHE_SIZE.scoped_raw("lots");
    assert_eq!(GraphCacheConfig::from_env().capacity, DEFAULT_GRAPH_CACHE_CAPACITY);
}
