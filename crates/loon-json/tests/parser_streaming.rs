//! End-to-end parser behavior over chunked input.

use loon_json::{
    BoundedStorage, Kind, ParseError, Parser, StoragePtr, parse_str, parse_with_storage,
};

#[test]
fn test_simple_object_in_document_order() {
    let v = parse_str(r#"{"a":1,"b":true,"c":"hi"}"#).unwrap();
    let o = v.as_object().unwrap();
    assert_eq!(o.len(), 3);
    let keys: Vec<&str> = o.keys().collect();
    assert_eq!(keys, ["a", "b", "c"]);
    assert_eq!(o.get("a").unwrap().as_i64(), Some(1));
    assert_eq!(o.get("a").unwrap().kind(), Kind::Signed);
    assert_eq!(o.get("b").unwrap().as_bool(), Some(true));
    assert_eq!(o.get("c").unwrap().as_str(), Some("hi"));
}

#[test]
fn test_trailing_comma_is_a_syntax_error() {
    assert!(matches!(
        parse_str("[1,2,]").unwrap_err(),
        ParseError::Syntax { offset: 5 }
    ));
}

#[test]
fn test_huge_exponent_overflows() {
    assert_eq!(parse_str("1e400").unwrap_err(), ParseError::ExponentOverflow);
}

#[test]
fn test_number_split_across_writes_concatenates() {
    let mut p = Parser::new();
    p.write(br#"{"x":1"#).unwrap();
    p.write(br#"2}"#).unwrap();
    p.write_eof().unwrap();
    let v = p.release().unwrap();
    assert_eq!(v.as_object().unwrap().get("x").unwrap().as_i64(), Some(12));
}

#[test]
fn test_byte_at_a_time_equals_whole_buffer() {
    let text = r#"{"room":"general","users":[{"name":"alice","ops":true},{"name":"béla","ops":false}],"motd":"say \"hi\" & wave 😀","count":-17,"ratio":0.625}"#;
    let whole = parse_str(text).unwrap();

    let mut p = Parser::new();
    for b in text.as_bytes() {
        p.write(std::slice::from_ref(b)).unwrap();
    }
    p.write_eof().unwrap();
    assert_eq!(p.release().unwrap(), whole);
}

#[test]
fn test_escape_split_across_writes() {
    let mut p = Parser::new();
    p.write(br#"["ab\"#).unwrap();
    p.write(br#"n\u26"#).unwrap();
    p.write(br#"03"]"#).unwrap();
    p.write_eof().unwrap();
    let v = p.release().unwrap();
    assert_eq!(v.as_array().unwrap()[0].as_str(), Some("ab\n\u{2603}"));
}

#[test]
fn test_multibyte_split_across_writes() {
    let text = "[\"\u{1f600}\"]".as_bytes();
    for cut in 1..text.len() {
        let mut p = Parser::new();
        p.write(&text[..cut]).unwrap();
        p.write(&text[cut..]).unwrap();
        p.write_eof().unwrap();
        let v = p.release().unwrap();
        assert_eq!(v.as_array().unwrap()[0].as_str(), Some("\u{1f600}"), "cut {cut}");
    }
}

#[test]
fn test_default_depth_limit() {
    let deep = "[".repeat(64) + &"]".repeat(64);
    assert!(parse_str(&deep).is_ok());

    let deeper = "[".repeat(65);
    let mut p = Parser::new();
    assert_eq!(
        p.write(deeper.as_bytes()).unwrap_err(),
        ParseError::TooDeep
    );
    // no partial tree is exposed after the failure
    assert!(p.get().is_none());
    assert!(p.release().is_none());
}

#[test]
fn test_nested_objects_hit_depth_limit() {
    let mut text = String::new();
    for _ in 0..70 {
        text.push_str("{\"a\":");
    }
    assert_eq!(parse_str(&text).unwrap_err(), ParseError::TooDeep);
}

#[test]
fn test_arena_exhaustion_fails_cleanly() {
    let sp = StoragePtr::new(BoundedStorage::new(128));
    let text = br#"{"first":"0123456789","second":"0123456789","third":"0123456789"}"#;
    assert_eq!(
        parse_with_storage(text, sp).unwrap_err(),
        ParseError::OutOfMemory
    );
}

#[test]
fn test_extra_data_after_document() {
    let mut p = Parser::new();
    assert_eq!(p.write(b"{} {}").unwrap_err(), ParseError::ExtraData);
}

#[test]
fn test_write_some_leaves_next_document() {
    let mut p = Parser::new();
    let stream = b"[1] [2] [3]";
    let mut at = 0;
    let mut seen = Vec::new();
    while at < stream.len() {
        at += p.write_some(&stream[at..]).unwrap();
        p.write_eof().unwrap();
        let v = p.release().unwrap();
        seen.push(v.as_array().unwrap()[0].as_i64().unwrap());
    }
    assert_eq!(seen, [1, 2, 3]);
}

#[test]
fn test_whitespace_only_input_is_incomplete() {
    let mut p = Parser::new();
    p.write(b"   \n\t ").unwrap();
    assert!(matches!(p.write_eof().unwrap_err(), ParseError::Syntax { .. }));
}
