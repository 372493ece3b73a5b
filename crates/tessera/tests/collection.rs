use tessera::{DbType, Error, Value, ValueType};
use tessera_test::{assert_no_leaks, tdb};

#[test]
fn it_walks_a_sparse_table() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let coll = conn.object_type("INT_ARRAY")?.new_object()?;

    for v in 1..=3 {
        coll.append_element(&Value::Int64(v))?;
    }
    assert_eq!(coll.size()?, 3);
    assert_eq!(coll.get_element_value_by_index(1, ValueType::Int64)?, Value::Int64(2));

    coll.delete_element_by_index(0)?;
    assert!(!coll.element_exists_by_index(0)?);
    assert!(coll.element_exists_by_index(1)?);
    assert_eq!(coll.size()?, 3);

    assert_eq!(coll.first_index()?, Some(1));
    assert_eq!(coll.last_index()?, Some(2));
    assert_eq!(coll.next_index(1)?, Some(2));
    assert_eq!(coll.next_index(2)?, None);
    assert_eq!(coll.prev_index(2)?, Some(1));
    assert_eq!(coll.prev_index(1)?, None);
    assert_eq!(coll.indices()?.collect::<Result<Vec<_>, _>>()?, [1, 2]);
    assert_eq!(
        coll.to_vec(ValueType::Int64)?,
        [Value::Int64(2), Value::Int64(3)]
    );

    assert!(matches!(
        coll.get_element_value_by_index(0, ValueType::Int64),
        Err(Error::InvalidIndex(0))
    ));
    let err = coll.delete_element_by_index(0).unwrap_err();
    assert!(matches!(err, Error::Native { action: "delete element", .. }), "{err}");

    // Assigning to a deleted index fills the gap again.
    coll.set_element_value_by_index(0, &Value::Int64(10))?;
    assert_eq!(coll.to_vec(ValueType::Int64)?.first(), Some(&Value::Int64(10)));

    drop(coll);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_reports_empty_collections() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let coll = conn.object_type("INT_ARRAY")?.new_object()?;

    assert_eq!(coll.size()?, 0);
    assert_eq!(coll.first_index()?, None);
    assert_eq!(coll.last_index()?, None);
    assert_eq!(coll.indices()?.count(), 0);
    assert!(coll.to_vec(ValueType::Int64)?.is_empty());

    // Deleting everything leaves slots but no elements.
    coll.append_element(&Value::Int64(1))?;
    coll.delete_element_by_index(0)?;
    assert_eq!(coll.size()?, 1);
    assert_eq!(coll.first_index()?, None);
    assert_eq!(coll.last_index()?, None);

    Ok(())
}

#[test]
fn it_trims_collections() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let coll = conn.object_type("PHONE_LIST")?.new_object()?;

    coll.extend(&[
        Value::Bytes(b"555-0100".to_vec()),
        Value::Bytes(b"555-0101".to_vec()),
        Value::Bytes(b"555-0102".to_vec()),
    ])?;
    coll.trim(2)?;
    assert_eq!(coll.size()?, 1);
    assert_eq!(
        coll.to_vec(ValueType::Bytes)?,
        [Value::Bytes(b"555-0100".to_vec())]
    );
    assert_eq!(engine.stats().live_strings, 1);

    let err = coll.trim(2).unwrap_err();
    assert!(matches!(err, Error::Native { action: "trim", .. }), "{err}");
    assert_eq!(coll.size()?, 1);

    drop(coll);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_enforces_varray_limits() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let coll = conn.object_type("PHONE_LIST")?.new_object()?;

    for n in 0..4 {
        coll.append_element(&Value::Bytes(format!("555-010{n}").into_bytes()))?;
    }
    let err = coll
        .append_element(&Value::Bytes(b"555-0199".to_vec()))
        .unwrap_err();
    assert!(matches!(err, Error::Native { action: "append element", .. }), "{err}");
    assert_eq!(coll.size()?, 4);
    assert_eq!(engine.stats().live_strings, 4);

    let err = coll
        .set_element_value_by_index(4, &Value::Bytes(b"555-0199".to_vec()))
        .unwrap_err();
    assert!(matches!(err, Error::Native { .. }), "{err}");

    drop(coll);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_converts_elements() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let coll = conn.object_type("INT_ARRAY")?.new_object()?;

    assert!(matches!(
        coll.append_element(&Value::Bytes(b"1".to_vec())),
        Err(Error::UnhandledConversion {
            db_type: DbType::NativeInt,
            value_type: ValueType::Bytes
        })
    ));
    assert!(matches!(
        coll.append_element(&Value::Int64(i64::MAX)),
        Err(Error::Conversion(_))
    ));
    assert_eq!(coll.size()?, 0);

    coll.append_element(&Value::Null)?;
    assert_eq!(coll.get_element_value_by_index(0, ValueType::Int64)?, Value::Null);
    assert!(matches!(
        coll.get_element_value_by_index(0, ValueType::Double),
        Ok(Value::Null)
    ));

    coll.set_element_value_by_index(0, &Value::Int64(5))?;
    assert!(matches!(
        coll.get_element_value_by_index(0, ValueType::Double),
        Err(Error::UnhandledConversion { .. })
    ));

    drop(coll);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_rejects_collection_operations_on_objects() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;

    match person.append_element(&Value::Int64(1)).unwrap_err() {
        Error::NotCollection { schema, name } => {
            assert_eq!(schema, "TESSERA");
            assert_eq!(name, "PERSON");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(person.size(), Err(Error::NotCollection { .. })));
    assert!(matches!(person.first_index(), Err(Error::NotCollection { .. })));
    assert!(matches!(person.trim(1), Err(Error::NotCollection { .. })));

    Ok(())
}

#[test]
fn it_appends_objects() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let people = conn.object_type("PERSON_LIST")?.new_object()?;

    let ada = conn.object_type("PERSON")?.new_object()?;
    ada.set("NAME", "Ada")?;
    people.append_object(&ada)?;
    // The collection holds a copy; later edits to the source do not reach it.
    ada.set("NAME", "Augusta")?;

    let grace = conn.object_type("PERSON")?.new_object()?;
    grace.set("NAME", "Grace")?;
    people.append_element(&Value::Object(grace))?;
    assert_eq!(conn.open_objects(), 2);

    let names = people
        .to_vec(ValueType::Object)?
        .iter()
        .map(|v| match v {
            Value::Object(person) => person.get_as::<String>("NAME"),
            other => panic!("expected an object, got {other:?}"),
        })
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(names, ["Ada", "Grace"]);

    let address = conn.object_type("ADDRESS")?.new_object()?;
    assert!(matches!(
        people.append_object(&address),
        Err(Error::WrongType { .. })
    ));
    assert!(matches!(
        conn.object_type("INT_ARRAY")?.new_object()?.append_object(&ada),
        Err(Error::UnhandledConversion { .. })
    ));
    assert_eq!(people.size()?, 2);

    drop((ada, address, people));
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_edits_nested_collections_in_place() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    person.set("PHONES", conn.object_type("PHONE_LIST")?.new_object()?)?;

    let phones = person.get_as::<tessera::Object>("PHONES")?;
    assert!(phones.is_dependent());
    phones.append_element(&Value::Bytes(b"555-0100".to_vec()))?;
    drop(phones);

    let phones = person.get_as::<tessera::Object>("PHONES")?;
    assert_eq!(phones.size()?, 1);

    drop((phones, person));
    assert_no_leaks(&engine);
    Ok(())
}
