use roxmltree::{Edge, ParsingOptions};

use crate::debug::DebugLogger;
use crate::document::{Document, DocumentBuilder, TokenEvent};
use crate::error::SceneError;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Tokenizes XML text into builder events. Element names use their local
/// part; `xlink:` and `xml:` attributes keep their conventional prefix.
pub fn events_from_str(xml: &str) -> Result<Vec<TokenEvent>, SceneError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)?;

    let mut events = Vec::new();
    for edge in doc.root().traverse() {
        match edge {
            Edge::Open(node) if node.is_element() => {
                let attributes = node
                    .attributes()
                    .map(|attr| {
                        let name = match attr.namespace() {
                            Some(XLINK_NS) => format!("xlink:{}", attr.name()),
                            Some(XML_NS) => format!("xml:{}", attr.name()),
                            _ => attr.name().to_string(),
                        };
                        (name, attr.value().to_string())
                    })
                    .collect();
                events.push(TokenEvent::StartElement {
                    name: node.tag_name().name().to_string(),
                    attributes,
                });
            }
            Edge::Open(node) if node.is_text() => {
                if let Some(text) = node.text() {
                    events.push(TokenEvent::Text(text.to_string()));
                }
            }
            Edge::Close(node) if node.is_element() => {
                events.push(TokenEvent::EndElement {
                    name: node.tag_name().name().to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(events)
}

pub fn parse_document(xml: &str, debug: Option<DebugLogger>) -> Result<Document, SceneError> {
    let mut builder = DocumentBuilder::new().with_debug(debug);
    builder.extend(events_from_str(xml)?);
    Ok(builder.finish())
}
