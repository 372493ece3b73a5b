use tessera::{Error, Object, Tessera, Value, ValueType, native::memory::NativeOp};
use tessera_test::{assert_no_leaks, connect_with, tdb};

#[test]
fn it_reads_back_a_name() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let name = person.attribute("NAME")?;

    person.set_attribute_value(&name, &Value::Bytes(b"Ada".to_vec()))?;
    assert_eq!(
        person.get_attribute_value(&name, ValueType::Bytes)?,
        Value::Bytes(b"Ada".to_vec())
    );

    person.set("AGE", 36)?;
    assert_eq!(person.get_as::<i64>("AGE")?, 36);
    assert_eq!(person.get_as::<String>("NAME")?, "Ada");
    assert_eq!(person.get_as::<Option<bool>>("ACTIVE")?, None);

    drop(person);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_closes_once() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    assert_eq!(conn.open_objects(), 1);

    person.close()?;
    assert!(person.is_closed());
    assert_eq!(engine.stats().object_frees, 1);
    assert_eq!(conn.open_objects(), 0);

    person.close()?;
    drop(person);
    assert_eq!(engine.stats().object_frees, 1);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_rejects_use_after_close() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let name = person.attribute("NAME")?;
    person.close()?;

    assert!(matches!(
        person.get_attribute_value(&name, ValueType::Bytes),
        Err(Error::ObjectClosed)
    ));
    assert!(matches!(
        person.set_attribute_value(&name, &Value::Null),
        Err(Error::ObjectClosed)
    ));
    assert!(matches!(person.copy(), Err(Error::ObjectClosed)));

    Ok(())
}

#[test]
fn it_frees_with_the_last_reference() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;

    let other = person.add_ref();
    assert!(Object::ptr_eq(&person, &other));
    assert_eq!(person.ref_count(), 2);

    person.release();
    assert_eq!(engine.stats().object_frees, 0);
    assert!(!other.is_closed());

    other.release();
    assert_eq!(engine.stats().object_frees, 1);
    assert_eq!(conn.open_objects(), 0);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_never_frees_through_a_dependent() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let address = conn.object_type("ADDRESS")?.new_object()?;
    address.set("CITY", "London")?;
    person.set("HOME", &address)?;
    drop(address);
    assert_eq!(engine.stats().object_frees, 1);

    let home = match person.get("HOME")? {
        Value::Object(home) => home,
        other => panic!("expected an object, got {other:?}"),
    };
    assert!(home.is_dependent());
    assert!(Object::ptr_eq(home.parent().expect("a parent"), &person));
    assert_eq!(person.ref_count(), 2);
    assert_eq!(conn.open_objects(), 1);
    assert_eq!(home.get_as::<String>("CITY")?, "London");

    home.close()?;
    assert!(home.is_closed());
    assert_eq!(engine.stats().object_frees, 1);
    assert!(matches!(home.get("CITY"), Err(Error::ObjectClosed)));

    // The parent and its embedded value are untouched.
    let again = person.get("HOME")?;
    assert_eq!(
        again.as_object().map(|a| a.get_as::<String>("CITY")).transpose()?,
        Some("London".to_string())
    );

    // A dependent keeps its parent alive.
    drop((home, person));
    assert_eq!(engine.stats().object_frees, 1);
    drop(again);
    assert_eq!(engine.stats().object_frees, 2);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_invalidates_dependents_with_their_parent() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    person.set("HOME", conn.object_type("ADDRESS")?.new_object()?)?;

    let home = person.get("HOME")?;
    let home = home.as_object().expect("an object");
    person.close()?;

    assert!(!home.is_closed());
    assert!(matches!(home.get("STREET"), Err(Error::ObjectClosed)));

    Ok(())
}

#[test]
fn it_recovers_from_failed_frees() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;

    engine.fail_next(NativeOp::ObjectFree);
    let err = person.close().unwrap_err();
    assert!(matches!(err, Error::Native { action: "free object", .. }), "{err}");
    assert!(!person.is_closed());
    assert_eq!(conn.open_objects(), 1);

    // The instance stays usable after a failed close.
    person.set("NAME", "Ada")?;

    engine.fail_next(NativeOp::IndicatorFree);
    let err = person.close().unwrap_err();
    assert!(
        matches!(err, Error::Native { action: "free object indicator", .. }),
        "{err}"
    );
    assert_eq!(engine.stats().object_frees, 1);
    assert_eq!(engine.stats().live_indicators, 1);

    // The retry only frees what is left.
    person.close()?;
    assert!(person.is_closed());
    assert_eq!(engine.stats().object_frees, 1);
    assert_eq!(conn.open_objects(), 0);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_cleans_up_failed_allocations() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let ty = conn.object_type("PERSON")?;

    engine.fail_next(NativeOp::ObjectNew);
    assert!(matches!(
        ty.new_object(),
        Err(Error::Native { action: "create object", .. })
    ));

    engine.fail_next(NativeOp::ObjectGetInd);
    assert!(matches!(
        ty.new_object(),
        Err(Error::Native { action: "get object indicator", .. })
    ));

    assert_eq!(conn.open_objects(), 0);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_copies_objects() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    person.set("NAME", "Ada")?;
    person.set("PHOTO", vec![1_u8, 2, 3])?;

    let copy = person.copy()?;
    assert!(!Object::ptr_eq(&person, &copy));
    assert!(!copy.is_dependent());
    assert_eq!(conn.open_objects(), 2);

    copy.set("NAME", "Grace")?;
    assert_eq!(person.get_as::<String>("NAME")?, "Ada");
    assert_eq!(copy.get_as::<String>("NAME")?, "Grace");

    drop(person);
    assert_eq!(copy.get_as::<String>("NAME")?, "Grace");

    engine.fail_next(NativeOp::ObjectCopy);
    assert!(matches!(
        copy.copy(),
        Err(Error::Native { action: "copy object", .. })
    ));
    assert_eq!(conn.open_objects(), 1);

    drop(copy);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_rejects_attributes_of_other_types() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let street = conn.object_type("ADDRESS")?.attribute("STREET")?.clone();

    let err = person
        .get_attribute_value(&street, ValueType::Bytes)
        .unwrap_err();
    match &err {
        Error::WrongAttr {
            attr,
            attr_type,
            object_type,
        } => {
            assert_eq!(attr, "STREET");
            assert_eq!(attr_type, "TESSERA.ADDRESS");
            assert_eq!(object_type, "TESSERA.PERSON");
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("TESSERA.ADDRESS") && message.contains("TESSERA.PERSON"));

    assert!(matches!(
        person.set_attribute_value(&street, &Value::Null),
        Err(Error::WrongAttr { .. })
    ));

    Ok(())
}

#[test]
fn it_rejects_objects_of_other_types() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let other = conn.object_type("PERSON")?.new_object()?;

    let err = person.set("HOME", &other).unwrap_err();
    match err {
        Error::WrongType { actual, expected } => {
            assert_eq!(actual, "TESSERA.PERSON");
            assert_eq!(expected, "TESSERA.ADDRESS");
        }
        other => panic!("unexpected error: {other}"),
    }

    drop((person, other));
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_resets_attributes() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let person = conn.object_type("PERSON")?.new_object()?;
    person.set("NAME", "Ada")?;
    person.set("ACTIVE", true)?;
    person.set("NOTES", "notes")?;

    person.reset_attributes()?;
    assert_eq!(person.get("NAME")?, Value::Null);
    assert_eq!(person.get("ACTIVE")?, Value::Null);
    assert_eq!(person.get("NOTES")?, Value::Null);

    drop(person);
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_force_closes_objects_on_disconnect() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    let ty = conn.object_type("PERSON")?;
    let person = ty.new_object()?;
    let other = ty.new_object()?;
    other.set("HOME", conn.object_type("ADDRESS")?.new_object()?)?;
    let home = other.get("HOME")?;
    assert_eq!(conn.open_objects(), 2);

    conn.close();
    assert!(!conn.is_connected());
    assert!(person.is_closed());
    assert!(other.is_closed());
    assert_eq!(conn.open_objects(), 0);
    assert_eq!(conn.cached_types_size(), 0);
    assert_no_leaks(&engine);

    assert!(matches!(person.get("NAME"), Err(Error::NotConnected)));
    let home = home.as_object().expect("an object");
    assert!(matches!(home.get("CITY"), Err(Error::NotConnected)));
    assert!(matches!(ty.new_object(), Err(Error::NotConnected)));
    assert!(matches!(conn.object_type("PERSON"), Err(Error::NotConnected)));

    // Closing again, or dropping what is left, frees nothing more.
    let frees = engine.stats().object_frees;
    conn.close();
    person.close()?;
    drop((person, other));
    assert_eq!(engine.stats().object_frees, frees);
    Ok(())
}

#[test]
fn it_tears_down_with_the_last_connection() -> anyhow::Result<()> {
    let (engine, conn) = connect_with(&Tessera::new())?;
    let person = conn.object_type("PERSON")?.new_object()?;
    let clone = conn.clone();

    drop(conn);
    assert!(!person.is_closed());
    assert!(clone.is_connected());

    drop(clone);
    assert!(person.is_closed());
    assert!(matches!(person.get("NAME"), Err(Error::NotConnected)));
    assert_no_leaks(&engine);
    Ok(())
}

#[test]
fn it_tracks_open_objects() -> anyhow::Result<()> {
    let (_engine, conn) = tdb()?;
    let ty = conn.object_type("ADDRESS")?;

    let objects = (0..10).map(|_| ty.new_object()).collect::<Result<Vec<_>, _>>()?;
    assert_eq!(conn.open_objects(), 10);

    for obj in objects.iter().step_by(2) {
        obj.close()?;
    }
    assert_eq!(conn.open_objects(), 5);

    // Freed slots are reused.
    let more = (0..5).map(|_| ty.new_object()).collect::<Result<Vec<_>, _>>()?;
    assert_eq!(conn.open_objects(), 10);

    drop(objects);
    drop(more);
    assert_eq!(conn.open_objects(), 0);
    Ok(())
}

#[test]
fn it_looks_up_types_by_name() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;

    let person = conn.object_type("person")?;
    assert_eq!(person.full_name(), "TESSERA.PERSON");
    assert_eq!(person.num_attributes(), 9);
    assert!(!person.is_collection());
    assert!(std::sync::Arc::ptr_eq(&person, &conn.object_type("person")?));
    assert_eq!(conn.object_type("tessera.person")?.tdo(), person.tdo());

    let names: Vec<_> = person.attributes().map(|a| a.name().to_string()).collect();
    assert_eq!(
        names,
        ["NAME", "AGE", "BORN", "ACTIVE", "HOME", "PHONES", "PHOTO", "NOTES", "TENURE"]
    );
    let home = person.attribute("home")?;
    assert_eq!(
        home.type_info().object_type.as_ref().map(|t| t.full_name()),
        Some("TESSERA.ADDRESS".to_string())
    );

    let mixed = conn.object_type("\"Mixed\"")?;
    assert_eq!(mixed.name(), "Mixed");
    assert_eq!(mixed.attribute("camelCase")?.name(), "camelCase");
    assert_eq!(mixed.attribute("\"camelCase\"")?.name(), "camelCase");
    assert_eq!(mixed.attribute("upper_case")?.name(), "UPPER_CASE");
    assert!(matches!(
        mixed.attribute("camelcase"),
        Err(Error::NoSuchAttribute { .. })
    ));

    assert!(matches!(
        conn.object_type("mixed"),
        Err(Error::TypeNotFound { .. })
    ));
    assert!(matches!(
        conn.object_type("NO_SUCH_TYPE"),
        Err(Error::TypeNotFound { .. })
    ));

    engine.fail_next(NativeOp::DescribeType);
    assert!(matches!(
        conn.object_type("INT_ARRAY"),
        Err(Error::Native { action: "get object type", .. })
    ));
    assert!(conn.object_type("INT_ARRAY")?.is_collection());

    let err = person.attribute("SHOE_SIZE").unwrap_err();
    assert!(err.to_string().contains("NAME, AGE"), "{err}");
    Ok(())
}

#[test]
fn it_rejects_types_that_contain_themselves() -> anyhow::Result<()> {
    let (engine, conn) = tdb()?;
    engine.execute_ddl(
        "CREATE TYPE NODE AS OBJECT (V NUMBER, KIDS NODE_LIST);
         CREATE TYPE NODE_LIST AS TABLE OF NODE;
         CREATE TYPE CHAIN AS OBJECT (NEXT CHAIN);",
    )?;

    match conn.object_type("NODE").unwrap_err() {
        Error::RecursiveType { type_name } => assert_eq!(type_name, "TESSERA.NODE"),
        other => panic!("unexpected error: {other}"),
    }
    match conn.object_type("node_list").unwrap_err() {
        Error::RecursiveType { type_name } => assert_eq!(type_name, "TESSERA.NODE_LIST"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        conn.object_type("CHAIN"),
        Err(Error::RecursiveType { .. })
    ));

    // Nothing half built is cached, and other lookups are unaffected.
    let before = conn.cached_types_size();
    assert!(conn.object_type("NODE").is_err());
    assert_eq!(conn.cached_types_size(), before);
    assert_eq!(conn.object_type("PERSON")?.full_name(), "TESSERA.PERSON");
    Ok(())
}
