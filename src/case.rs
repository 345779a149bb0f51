/// The lowerCamelCase name used for a field in JSON.
pub(crate) fn to_json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = false;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

pub(crate) fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

#[test]
fn json_name() {
    assert_eq!(to_json_name("foo_bar"), "fooBar");
    assert_eq!(to_json_name("foo__bar_"), "fooBar");
    assert_eq!(to_json_name("FooBar"), "FooBar");
}

#[test]
fn pascal_case() {
    assert_eq!(to_pascal_case("foo_bar"), "FooBar");
    assert_eq!(to_pascal_case("values"), "Values");
    assert_eq!(to_pascal_case("_x"), "X");
}
