/// Interpret an environment-style boolean flag. Recognized spellings are `1`/`0`, `true`/`false`,
/// `yes`/`no` and `on`/`off`, case-insensitively; anything else, including an unset value, falls
/// back to `default`.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];
    const FALSY: [&str; 4] = ["0", "false", "no", "off"];
    let Some(value) = value else { return default };
    let value = value.trim();
    if TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t)) {
        true
    } else if FALSY.iter().any(|f| value.eq_ignore_ascii_case(f)) {
        false
    } else {
        default
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognized_spellings_override_the_default() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_boolean_flag(Some(v.to_string()), false), "{v} should read as true");
        }
        for v in ["0", "false", "No", "OFF"] {
            assert!(!parse_boolean_flag(Some(v.to_string()), true), "{v} should read as false");
        }
    }

    #[test]
    fn unset_or_unrecognized_values_fall_back() {
        assert!(parse_boolean_flag(None, true));
        assert!(!parse_boolean_flag(None, false));
        assert!(parse_boolean_flag(Some("maybe".to_string()), true));
        assert!(!parse_boolean_flag(Some("2".to_string()), false));
    }
}
