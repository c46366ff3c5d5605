//! Length-limit enforcement on attribute and keyed-collection writes.

use workset_core::Persistable;
use workset_testkit::{test_session, test_store, Site, Tank};

#[test]
fn attribute_writes_respect_the_declared_length() {
    let store = test_store();
    store.set_property_length("Site", "name", 6);
    let session = test_session(&store);
    let site = session.register(Site::new("")).unwrap();

    Site::set_name(&session, &site, "Berlin-Friedrichshain").unwrap();
    assert_eq!(site.read().name, "Berlin");
}

#[test]
fn values_within_the_limit_pass_unchanged() {
    let store = test_store();
    store.set_property_length("Site", "name", 16);
    let session = test_session(&store);
    let site = session.register(Site::new("")).unwrap();

    Site::set_name(&session, &site, "Berlin").unwrap();
    assert_eq!(site.read().name, "Berlin");
}

#[test]
fn undeclared_properties_are_never_truncated() {
    let store = test_store();
    let session = test_session(&store);
    let site = session.register(Site::new("")).unwrap();

    let long = "x".repeat(500);
    Site::set_name(&session, &site, &long).unwrap();
    assert_eq!(site.read().name.len(), 500);
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let store = test_store();
    store.set_property_length("Site", "name", 4);
    let session = test_session(&store);
    let site = session.register(Site::new("")).unwrap();

    Site::set_name(&session, &site, "Müîîü-city").unwrap();
    assert_eq!(site.read().name, "Müîî");
}

#[test]
fn non_character_values_pass_through() {
    let store = test_store();
    store.set_property_length("Tank", "volume", 2);
    let session = test_session(&store);
    let tank = session.register(Tank::new("silo1", 0)).unwrap();

    Tank::set_volume(&session, &tank, 123_456).unwrap();
    assert_eq!(tank.read().volume, 123_456);
}

#[test]
fn keyed_writes_use_the_singular_lookup_names() {
    let store = test_store();
    // "properties" rewrites to "property" before the suffix lookup.
    store.set_property_length("Site", "property.index", 4);
    store.set_property_length("Site", "property.element", 5);
    let session = test_session(&store);
    let site = session.register(Site::new("Berlin")).unwrap();

    Site::put_property(&session, &site, "region-code", "east-berlin").unwrap();

    let obj = site.read();
    assert_eq!(obj.properties.get("regi").map(String::as_str), Some("east-"));
    assert!(obj.properties.get("region-code").is_none());
}

#[test]
fn keyed_writes_without_limits_keep_full_key_and_value() {
    let store = test_store();
    let session = test_session(&store);
    let site = session.register(Site::new("Berlin")).unwrap();

    Site::put_property(&session, &site, "region-code", "east-berlin").unwrap();
    assert_eq!(
        site.read().properties.get("region-code").map(String::as_str),
        Some("east-berlin")
    );
}

#[test]
fn truncated_values_round_trip_through_the_store() {
    let store = test_store();
    store.set_property_length("Site", "name", 6);
    let session = test_session(&store);
    let site = session.register(Site::new("")).unwrap();
    Site::set_name(&session, &site, "Berlin-Mitte").unwrap();
    session.commit().unwrap();
    let id = site.read().store_id();
    drop(session);

    let session = test_session(&store);
    let reloaded = Site::load(&session, id).unwrap();
    assert_eq!(reloaded.read().name, "Berlin");
}
