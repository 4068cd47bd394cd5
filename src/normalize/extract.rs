use scraper::{Html, Selector};

use super::record::FlatRecord;

/// Prefix of keys synthesized from embedded markup.
pub const EXTRACTED_PREFIX: &str = "extracted::";

/// Pulls image sources and anchor targets out of HTML-bearing values.
///
/// For every value that contains markup, emits
/// `extracted::<key>::image<n>` and `extracted::<key>::anchor<n>` entries
/// (1-based, document order). Values without markup contribute nothing.
///
/// Elements without the attribute are skipped. Attribute values are trimmed, and
/// elements whose attribute is blank are skipped too and do not consume a number,
/// so extracted entries obey the same non-blank rule as every other record value.
pub fn extract_links(record: &FlatRecord) -> FlatRecord {
    let mut extracted = FlatRecord::new();

    let (Ok(images), Ok(anchors)) = (Selector::parse("img[src]"), Selector::parse("a[href]"))
    else {
        return extracted;
    };

    for (key, value) in record {
        if !looks_like_markup(value) {
            continue;
        }

        let fragment = Html::parse_fragment(value);

        let sources = fragment
            .select(&images)
            .filter_map(|el| el.value().attr("src"))
            .filter(|src| !src.trim().is_empty());
        for (i, src) in sources.enumerate() {
            extracted.insert(
                format!("{EXTRACTED_PREFIX}{key}::image{}", i + 1),
                src.trim().to_string(),
            );
        }

        let targets = fragment
            .select(&anchors)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| !href.trim().is_empty());
        for (i, href) in targets.enumerate() {
            extracted.insert(
                format!("{EXTRACTED_PREFIX}{key}::anchor{}", i + 1),
                href.trim().to_string(),
            );
        }
    }

    extracted
}

/// Cheap gate before invoking the HTML parser.
fn looks_like_markup(value: &str) -> bool {
    value
        .find('<')
        .is_some_and(|open| value[open..].contains('>'))
}
