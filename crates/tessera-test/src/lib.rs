use std::sync::Arc;

use tessera::{Connection, Tessera, native::memory::MemoryEngine};

const TEST_SCHEMA: &str = include_str!("setup.sql");

/// An engine with the test schema declared.
pub fn engine() -> anyhow::Result<Arc<MemoryEngine>> {
    let engine = Arc::new(MemoryEngine::new());
    engine.execute_ddl(TEST_SCHEMA)?;
    Ok(engine)
}

/// Connect with the given options to a fresh engine with the test schema.
pub fn connect_with(options: &Tessera) -> anyhow::Result<(Arc<MemoryEngine>, Connection)> {
    let engine = engine()?;
    let conn = Connection::connect_with(options, engine.clone())?;
    Ok((engine, conn))
}

/// Return a connection to a fresh engine pre-configured with our test schema,
/// along with the engine so tests can inspect its allocations.
pub fn tdb() -> anyhow::Result<(Arc<MemoryEngine>, Connection)> {
    init_logging();
    connect_with(&Tessera::new())
}

pub fn connection() -> anyhow::Result<Connection> {
    Ok(tdb()?.1)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assert that nothing allocated by the engine is still live.
pub fn assert_no_leaks(engine: &MemoryEngine) {
    let stats = engine.stats();
    assert_eq!(stats.live_instances, 0, "live instances: {stats:?}");
    assert_eq!(stats.live_indicators, 0, "live indicators: {stats:?}");
    assert_eq!(stats.live_strings, 0, "live strings: {stats:?}");
    assert_eq!(stats.live_raws, 0, "live raws: {stats:?}");
    assert_eq!(stats.live_descriptors, 0, "live descriptors: {stats:?}");
    assert_eq!(stats.live_locators, 0, "live locators: {stats:?}");
}

// Test that a value written to an attribute of the CONVERSIONS type reads back
// unchanged as the given external type, and that nothing leaks.
#[macro_export]
macro_rules! test_conversion {
    ($name:ident($attr:literal as $value_type:ident, $($value:expr),+ $(,)?)) => {
        paste::item! {
            #[test]
            fn [< test_conversion_ $name >] () -> anyhow::Result<()> {
                use tessera::{Value, ValueType};

                let (engine, conn) = $crate::tdb()?;
                let obj = conn.object_type("CONVERSIONS")?.new_object()?;
                let attr = obj.attribute($attr)?;

                $(
                    let value: Value = $value;
                    obj.set_attribute_value(&attr, &value)?;
                    let returned = obj.get_attribute_value(&attr, ValueType::$value_type)?;
                    assert_eq!(value, returned, "round trip through {}", $attr);
                )+

                drop(obj);
                $crate::assert_no_leaks(&engine);
                Ok(())
            }
        }
    };
}
