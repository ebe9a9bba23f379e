use lantern::container::NameValueTable;

#[test]
fn test_table_set_then_get_returns_latest() {
    let mut table = NameValueTable::new();
    table.set("Content-Type", Some("text/plain"));
    table.set("Content-Type", Some("text/html"));

    assert_eq!(table.get("Content-Type"), Some("text/html"));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_table_set_none_removes() {
    let mut table = NameValueTable::new();
    table.insert("X-Token", "abc");

    let previous = table.set("X-Token", None);

    assert_eq!(previous.as_deref(), Some("abc"));
    assert_eq!(table.get("X-Token"), None);
    assert!(table.is_empty());
}

#[test]
fn test_table_set_none_on_missing_is_noop() {
    let mut table = NameValueTable::new();
    assert_eq!(table.set("Missing", None), None);
    assert!(table.is_empty());
}

#[test]
fn test_table_names_are_case_sensitive() {
    let mut table = NameValueTable::new();
    table.insert("host", "example.com");

    assert_eq!(table.get("host"), Some("example.com"));
    assert_eq!(table.get("Host"), None);
}

#[test]
fn test_table_iterates_in_insertion_order() {
    let mut table = NameValueTable::new();
    table.insert("Date", "d");
    table.insert("Server", "s");
    table.insert("Content-Length", "0");
    table.insert("Server", "s2");

    let names: Vec<&str> = table.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["Date", "Server", "Content-Length"]);
    assert!(table.contains_key("Server"));
}
