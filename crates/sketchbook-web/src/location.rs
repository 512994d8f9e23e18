#![forbid(unsafe_code)]

//! Query-string helpers for `history.replaceState` and configuration lookup.

use url::form_urlencoded;

/// Value of `key` in a `location.search` string (leading `?` optional).
#[must_use]
pub fn query_value(search: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Relative URL for `pathname` + `search` + `hash` with `key` set to
/// `value`, or removed when `value` is `None`. Other parameters keep their
/// order.
#[must_use]
pub fn with_query_param(
    pathname: &str,
    search: &str,
    hash: &str,
    key: &str,
    value: Option<&str>,
) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut replaced = false;
    for (k, v) in form_urlencoded::parse(search.trim_start_matches('?').as_bytes()) {
        if k != key {
            serializer.append_pair(&k, &v);
        } else if let (Some(value), false) = (value, replaced) {
            serializer.append_pair(key, value);
            replaced = true;
        }
    }
    if let (Some(value), false) = (value, replaced) {
        serializer.append_pair(key, value);
    }
    let query = serializer.finish();
    if query.is_empty() {
        format!("{pathname}{hash}")
    } else {
        format!("{pathname}?{query}{hash}")
    }
}

/// Configuration lookup: the query string first, then `attribute(key)`.
pub fn query_then<F>(search: String, attribute: F) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |key| query_value(&search, key).or_else(|| attribute(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_decoded_values() {
        assert_eq!(query_value("?viewMode=debug&x=a%20b", "x").as_deref(), Some("a b"));
        assert_eq!(query_value("viewMode=debug", "viewMode").as_deref(), Some("debug"));
        assert_eq!(query_value("", "viewMode"), None);
    }

    #[test]
    fn sets_param_in_place() {
        assert_eq!(
            with_query_param(
                "/s/ana/rain/edit",
                "?a=1&viewMode=code&b=2",
                "",
                "viewMode",
                Some("debug"),
            ),
            "/s/ana/rain/edit?a=1&viewMode=debug&b=2"
        );
    }

    #[test]
    fn appends_missing_param() {
        assert_eq!(
            with_query_param("/edit", "", "#top", "viewMode", Some("sketch")),
            "/edit?viewMode=sketch#top"
        );
    }

    #[test]
    fn removes_param_and_question_mark() {
        assert_eq!(
            with_query_param("/edit", "?viewMode=code", "", "viewMode", None),
            "/edit"
        );
        assert_eq!(
            with_query_param("/edit", "?viewMode=code&viewMode=debug&a=1", "", "viewMode", None),
            "/edit?a=1"
        );
    }

    #[test]
    fn query_wins_over_attribute() {
        let lookup = query_then("?viewMode=code".into(), |key| {
            (key == "viewMode" || key == "data-view-mode").then(|| "sketch".to_string())
        });
        assert_eq!(lookup("viewMode").as_deref(), Some("code"));
        assert_eq!(lookup("data-view-mode").as_deref(), Some("sketch"));
        assert_eq!(lookup("data-sandbox"), None);
    }
}
