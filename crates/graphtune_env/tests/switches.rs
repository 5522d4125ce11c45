use graphtune_env::{AutotuneEnvVar, DETERMINISTIC_OPS, DISABLE_REDZONE_CHECK, EnvVarError, Environment, GRAPH_CACHE_SIZE, LOG_LEVEL, ScopedEnv};
use serial_test::serial;
use tracing::Level;

#[test]
#[serial]
fn switches_observe_every_change() {
    let _clear = GRAPH_CACHE_SIZE.scoped_unset();
    assert_eq!(GRAPH_CACHE_SIZE.read(), Ok(None));

    {
        let _eight = GRAPH_CACHE_SIZE.scoped(&8);
        assert_eq!(GRAPH_CACHE_SIZE.read(), Ok(Some(8)));
    }
    {
        let _sixteen = GRAPH_CACHE_SIZE.scoped_raw("16");
        assert_eq!(GRAPH_CACHE_SIZE.read_or(32), 16);
    }
    assert_eq!(GRAPH_CACHE_SIZE.read_or(32), 32);
}

#[test]
#[serial]
fn nested_overrides_unwind_in_order() {
    let _clear = ScopedEnv::apply(AutotuneEnvVar::DeterministicOps, None);
    {
        let _on = DETERMINISTIC_OPS.scoped(&true);
        assert_eq!(Environment::get(AutotuneEnvVar::DeterministicOps).as_deref(), Some("1"));
        {
            let _off = DETERMINISTIC_OPS.scoped_unset();
            assert!(!Environment::is_set(AutotuneEnvVar::DeterministicOps));
        }
        assert_eq!(DETERMINISTIC_OPS.read(), Ok(Some(true)));
    }
    assert_eq!(DETERMINISTIC_OPS.read(), Ok(None));
}

#[test]
#[serial]
fn invalid_values_are_reported_and_fall_back() {
    let _junk = DISABLE_REDZONE_CHECK.scoped_raw("sometimes");
    match DISABLE_REDZONE_CHECK.read() {
        Err(EnvVarError::Invalid { name, value, .. }) => {
            assert_eq!(name, "GRAPHTUNE_DISABLE_RZ_CHECK");
            assert_eq!(value, "sometimes");
        }
        other => panic!("expected invalid value error, got {other:?}"),
    }
    assert!(!DISABLE_REDZONE_CHECK.read_or(false));
}

#[test]
#[serial]
fn log_level_survives_a_scoped_write() {
    let _debug = LOG_LEVEL.scoped(&Level::DEBUG);
    assert_eq!(LOG_LEVEL.read(), Ok(Some(Level::DEBUG)));
}
