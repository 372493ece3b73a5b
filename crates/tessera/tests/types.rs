use bstr::BString;
use std::sync::Arc;

use tessera::{Connection, DecodeError, Error, Lob, Object, native::memory::MemoryEngine};
use tessera_test::{assert_no_leaks, tdb};
use time::{
    OffsetDateTime, PrimitiveDateTime,
    macros::{date, datetime},
};

/// An instance of the CONVERSIONS type, along with the connection that keeps
/// it open.
fn conversions() -> anyhow::Result<(Arc<MemoryEngine>, Connection, Object)> {
    let (engine, conn) = tdb()?;
    let obj = conn.object_type("CONVERSIONS")?.new_object()?;
    Ok((engine, conn, obj))
}

#[test]
fn it_round_trips_rust_types() -> anyhow::Result<()> {
    let (engine, _conn, obj) = conversions()?;

    obj.set("VC", "this is foo")?;
    assert_eq!(obj.get_as::<String>("VC")?, "this is foo");

    obj.set("NVC", String::from("this \0is nul-containing"))?;
    assert_eq!(obj.get_as::<String>("NVC")?, "this \0is nul-containing");

    obj.set("BIN", &[0xDE_u8, 0xAD, 0xBE, 0xEF][..])?;
    assert_eq!(obj.get_as::<Vec<u8>>("BIN")?, [0xDE, 0xAD, 0xBE, 0xEF]);

    obj.set("FIXED", BString::from("bytes"))?;
    assert_eq!(obj.get_as::<BString>("FIXED")?, "bytes");

    obj.set("INT32", -94_101_i32)?;
    assert_eq!(obj.get_as::<i32>("INT32")?, -94_101);
    obj.set("INT32", 200_u8)?;
    assert_eq!(obj.get_as::<u8>("INT32")?, 200);

    obj.set("F32", 1.25_f32)?;
    assert_eq!(obj.get_as::<f32>("F32")?, 1.25);
    obj.set("F64", 939_399_419.122_518_2_f64)?;
    assert_eq!(obj.get_as::<f64>("F64")?, 939_399_419.122_518_2);

    // Numbers read as doubles by default, and integers decode from them.
    obj.set("NUM", 9_358_295_312_i64)?;
    assert_eq!(obj.get_as::<i64>("NUM")?, 9_358_295_312);
    assert_eq!(obj.get_as::<f64>("NUM")?, 9_358_295_312.0);
    obj.set("NUM", 5.5_f64)?;
    assert!(matches!(
        obj.get_as::<i64>("NUM"),
        Err(Error::Decode(DecodeError::Conversion(_)))
    ));

    obj.set("FLAG", true)?;
    assert!(obj.get_as::<bool>("FLAG")?);

    let ts = datetime!(2024-01-02 03:04:05.678 +01:00);
    obj.set("TSTZ", ts)?;
    assert_eq!(obj.get_as::<OffsetDateTime>("TSTZ")?, ts);
    obj.set("DAY", date!(2020 - 02 - 29))?;
    assert_eq!(
        obj.get_as::<PrimitiveDateTime>("DAY")?,
        datetime!(2020-02-29 0:00)
    );

    obj.set("DOC", "large text")?;
    let doc = obj.get_as::<Lob>("DOC")?;
    assert_eq!(doc.read_to_end()?, b"large text");

    drop((doc, obj));
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_decodes_nulls_as_none() -> anyhow::Result<()> {
    let (_engine, _conn, obj) = conversions()?;

    assert_eq!(obj.get_as::<Option<String>>("VC")?, None);
    assert_eq!(obj.get_as::<Option<i64>>("NUM")?, None);
    assert_eq!(obj.get_as::<Option<OffsetDateTime>>("TS")?, None);

    obj.set("NUM", Some(3_i64))?;
    assert_eq!(obj.get_as::<Option<i64>>("NUM")?, Some(3));
    obj.set("NUM", None::<i64>)?;
    assert_eq!(obj.get_as::<Option<i64>>("NUM")?, None);

    Ok(())
}

#[test]
fn it_rejects_incompatible_types() -> anyhow::Result<()> {
    let (_engine, _conn, obj) = conversions()?;
    obj.set("FLAG", false)?;
    obj.set("INT32", 300_i32)?;

    assert!(matches!(
        obj.get_as::<String>("FLAG"),
        Err(Error::Decode(DecodeError::ValueType(_)))
    ));
    assert!(matches!(
        obj.get_as::<u8>("INT32"),
        Err(Error::Decode(DecodeError::Conversion(_)))
    ));
    assert!(matches!(obj.set("INT32", u64::MAX), Err(Error::UnhandledConversion { .. })));

    Ok(())
}
