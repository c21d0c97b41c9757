/// (ids, classes, tags), compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u16, pub u16, pub u16);

/// Compound selector: optional tag, optional id, any number of classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

/// Compound selectors joined by descendant combinators, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub text: String,
    pub parts: Vec<SimpleSelector>,
    pub specificity: Specificity,
}

/// The matching-relevant view of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementKey<'a> {
    pub tag: &'a str,
    pub id: Option<&'a str>,
    /// Raw `class` attribute, whitespace separated.
    pub classes: &'a str,
}

impl ElementKey<'_> {
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.split_whitespace().any(|c| c == name)
    }
}

/// Decides whether a rule's selector applies to an element.
///
/// `ancestors` is ordered from the parent outwards.
pub trait SelectorMatcher: Send + Sync {
    fn matches(
        &self,
        selector: &Selector,
        element: &ElementKey<'_>,
        ancestors: &[ElementKey<'_>],
    ) -> bool;
}

/// Tag/id/class compounds with descendant combinators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSelectorMatcher;

impl SelectorMatcher for SimpleSelectorMatcher {
    fn matches(
        &self,
        selector: &Selector,
        element: &ElementKey<'_>,
        ancestors: &[ElementKey<'_>],
    ) -> bool {
        let Some((last, rest)) = selector.parts.split_last() else {
            return false;
        };
        if !simple_matches(element, last) {
            return false;
        }

        let mut remaining = ancestors.iter();
        for part in rest.iter().rev() {
            if !remaining.by_ref().any(|candidate| simple_matches(candidate, part)) {
                return false;
            }
        }
        true
    }
}

fn simple_matches(element: &ElementKey<'_>, selector: &SimpleSelector) -> bool {
    if let Some(tag) = &selector.tag {
        if !element.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &selector.id {
        if element.id != Some(id.as_str()) {
            return false;
        }
    }
    selector.classes.iter().all(|c| element.has_class(c))
}

/// Parses one selector of a selector list. Returns `None` for anything beyond
/// tag/id/class compounds and descendant combinators.
pub fn parse_selector(raw: &str) -> Option<Selector> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut specificity = Specificity::default();
    for token in text.split_whitespace() {
        let part = parse_simple_selector(token)?;
        if part.id.is_some() {
            specificity.0 += 1;
        }
        specificity.1 += part.classes.len() as u16;
        if part.tag.is_some() {
            specificity.2 += 1;
        }
        parts.push(part);
    }

    Some(Selector {
        text: text.to_string(),
        parts,
        specificity,
    })
}

fn parse_simple_selector(token: &str) -> Option<SimpleSelector> {
    if token.contains([':', '[', ']', '>', '+', '~', '(']) {
        return None;
    }

    let bytes = token.as_bytes();
    let len = bytes.len();
    let mut i = 0usize;
    let mut tag = None;
    let mut id = None;
    let mut classes = Vec::new();
    let mut universal = false;

    match bytes.first() {
        Some(b'*') => {
            universal = true;
            i = 1;
        }
        Some(&b) if is_ident_start(b) => {
            while i < len && is_ident_char(bytes[i]) {
                i += 1;
            }
            tag = Some(token[..i].to_ascii_lowercase());
        }
        _ => {}
    }

    while i < len {
        let marker = bytes[i];
        i += 1;
        let start = i;
        while i < len && is_ident_char(bytes[i]) {
            i += 1;
        }
        if start == i {
            return None;
        }
        let name = token[start..i].to_string();
        match marker {
            b'.' => classes.push(name),
            b'#' if id.is_none() => id = Some(name),
            _ => return None,
        }
    }

    if !universal && tag.is_none() && id.is_none() && classes.is_empty() {
        return None;
    }
    Some(SimpleSelector { tag, id, classes })
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, b'_' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(tag: &'a str, id: Option<&'a str>, classes: &'a str) -> ElementKey<'a> {
        ElementKey { tag, id, classes }
    }

    #[test]
    fn specificity_counts_ids_classes_tags() {
        let s = parse_selector("svg g#main .a.b rect").expect("selector");
        assert_eq!(s.parts.len(), 4);
        assert_eq!(s.specificity, Specificity(1, 2, 3));
        assert!(Specificity(1, 0, 0) > Specificity(0, 9, 9));
    }

    #[test]
    fn rejects_unsupported_selectors() {
        assert!(parse_selector("a:hover").is_none());
        assert!(parse_selector("g > rect").is_none());
        assert!(parse_selector("rect[width]").is_none());
        assert!(parse_selector("#a#b").is_none());
        assert!(parse_selector("  ").is_none());
        assert!(parse_selector("*").is_some());
    }

    #[test]
    fn matches_compound_and_descendant() {
        let m = SimpleSelectorMatcher;
        let sel = parse_selector("g.layer rect#r.hot").expect("selector");
        let el = key("rect", Some("r"), "cold hot");
        let ancestors = [key("g", None, ""), key("g", None, "layer top"), key("svg", None, "")];
        assert!(m.matches(&sel, &el, &ancestors));
        assert!(!m.matches(&sel, &el, &ancestors[..1]));
        assert!(!m.matches(&sel, &key("rect", Some("r"), "cold"), &ancestors));
    }

    #[test]
    fn descendant_parts_match_in_order() {
        let m = SimpleSelectorMatcher;
        let sel = parse_selector("svg g rect").expect("selector");
        // g must sit below svg.
        let ancestors = [key("svg", None, ""), key("g", None, "")];
        assert!(!m.matches(&sel, &key("rect", None, ""), &ancestors));
        let ancestors = [key("g", None, ""), key("svg", None, "")];
        assert!(m.matches(&sel, &key("rect", None, ""), &ancestors));
    }

    #[test]
    fn tag_match_is_case_insensitive() {
        let sel = parse_selector("RECT").expect("selector");
        assert!(SimpleSelectorMatcher.matches(&sel, &key("rect", None, ""), &[]));
    }
}
