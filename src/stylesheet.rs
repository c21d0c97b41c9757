use std::sync::{Arc, RwLock};

use lightningcss::declaration::DeclarationBlock;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleAttribute, StyleSheet};
use lightningcss::traits::ToCss;

use crate::selector::{Selector, parse_selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lower-cased property name.
    pub name: String,
    pub value: String,
}

/// One selector of a stylesheet rule. A rule with a selector list contributes
/// one entry per selector, all sharing the rule's document order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
    pub order: usize,
}

#[derive(Debug, Default)]
pub struct ParsedStylesheet {
    pub rules: Vec<StyleRule>,
    /// Selectors that were skipped as unsupported.
    pub dropped_selectors: Vec<String>,
    /// Parse errors recovered from by skipping the offending rule or declaration.
    pub warnings: Vec<String>,
}

/// Parses stylesheet text. `order` is the running rule counter of the owning
/// document and is advanced once per rule. Returns `None` when the text is not
/// a valid stylesheet.
pub fn parse_stylesheet(css: &str, order: &mut usize) -> Option<ParsedStylesheet> {
    let css = css.trim();
    let mut out = ParsedStylesheet::default();
    if css.is_empty() {
        return Some(out);
    }
    let warnings = Arc::new(RwLock::new(Vec::new()));
    let options = ParserOptions {
        error_recovery: true,
        warnings: Some(warnings.clone()),
        ..ParserOptions::default()
    };
    let sheet = StyleSheet::parse(css, options).ok()?;
    collect_rules(&sheet.rules, &mut out, order);
    if let Ok(recovered) = warnings.read() {
        out.warnings = recovered.iter().map(|w| w.to_string()).collect();
    }
    Some(out)
}

/// Parses an inline `style` attribute. Invalid declarations are skipped.
pub fn parse_style_attribute(input: &str) -> Vec<Declaration> {
    let options = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    match StyleAttribute::parse(input, options) {
        Ok(attr) => block_declarations(&attr.declarations),
        Err(_) => Vec::new(),
    }
}

/// Serializes a parsed block back into ordered declarations, normal ones
/// first so `!important` values win within the block.
fn block_declarations(block: &DeclarationBlock<'_>) -> Vec<Declaration> {
    let normal = block.declarations.iter().map(|p| (p, false));
    let important = block.important_declarations.iter().map(|p| (p, true));
    let text: Vec<String> = normal
        .chain(important)
        .filter_map(|(property, important)| {
            property
                .to_css_string(important, PrinterOptions::default())
                .ok()
        })
        .collect();
    parse_declarations(&text.join(";"))
}

fn collect_rules(rules: &CssRuleList<'_>, out: &mut ParsedStylesheet, order: &mut usize) {
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style_rule) => {
                let selectors = style_rule
                    .selectors
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default();
                let declarations = block_declarations(&style_rule.declarations);
                if !declarations.is_empty() {
                    for raw in split_top_level(&selectors, ',') {
                        match parse_selector(raw) {
                            Some(selector) => out.rules.push(StyleRule {
                                selector,
                                declarations: declarations.clone(),
                                order: *order,
                            }),
                            None => out.dropped_selectors.push(raw.trim().to_string()),
                        }
                    }
                }
                *order += 1;
            }
            CssRule::Media(media) => collect_rules(&media.rules, out, order),
            _ => {}
        }
    }
}

/// Splits serialized declarations (`name: value; ...`) into ordered pairs,
/// dropping any `!important` suffix.
fn parse_declarations(input: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    for decl in split_top_level(input, ';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let mut value = value.trim();
        if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
            if value[idx + "!important".len()..].trim().is_empty() {
                value = value[..idx].trim_end();
            }
        }
        if name.is_empty() || value.is_empty() {
            continue;
        }
        out.push(Declaration {
            name,
            value: value.to_string(),
        });
    }
    out
}

/// Splits on `sep` outside parentheses and quotes.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = (depth - 1).max(0),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_declarations_and_strips_important() {
        let decls = parse_declarations("Fill: red ; stroke:url(\"#a;b\") blue; bogus; stroke-width: 2 !IMPORTANT;");
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].name, "fill");
        assert_eq!(decls[0].value, "red");
        assert_eq!(decls[1].value, "url(\"#a;b\") blue");
        assert_eq!(decls[2].value, "2");
    }

    #[test]
    fn style_attribute_goes_through_the_css_parser() {
        let decls = parse_style_attribute("fill:/* accent */ blue; stroke-width: 2px");
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["fill", "stroke-width"]);
        assert!(!decls[0].value.contains("/*"));
        assert!(parse_style_attribute("").is_empty());
    }

    #[test]
    fn broken_rule_does_not_take_down_the_sheet() {
        let mut order = 0;
        let sheet = parse_stylesheet(
            "rect { fill: blue } g:nth-child(2n+ { fill: red } circle { stroke: green }",
            &mut order,
        )
        .expect("recovered stylesheet");
        let tags: Vec<_> = sheet
            .rules
            .iter()
            .map(|r| r.selector.text.as_str())
            .collect();
        assert_eq!(tags[0], "rect");
        assert!(!tags.contains(&"g"));
        assert!(!sheet.warnings.is_empty());
    }

    #[test]
    fn selector_lists_share_rule_order() {
        let mut order = 0;
        let sheet = parse_stylesheet(
            "rect, .a { fill: blue } circle:hover { fill: red } #x { stroke: green }",
            &mut order,
        )
        .expect("stylesheet");
        assert_eq!(order, 3);
        let orders: Vec<_> = sheet.rules.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 0, 2]);
        assert_eq!(sheet.dropped_selectors.len(), 1);
        assert_eq!(sheet.rules[1].selector.text, ".a");
    }

    #[test]
    fn media_rules_are_included() {
        let mut order = 5;
        let sheet = parse_stylesheet("@media print { g rect { fill: #00f } }", &mut order)
            .expect("stylesheet");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].order, 5);
        assert_eq!(sheet.rules[0].declarations[0].name, "fill");
    }

    #[test]
    fn empty_sheet_parses_to_nothing() {
        let mut order = 0;
        let sheet = parse_stylesheet("   ", &mut order).expect("empty stylesheet");
        assert!(sheet.rules.is_empty());
        assert_eq!(order, 0);
    }
}
