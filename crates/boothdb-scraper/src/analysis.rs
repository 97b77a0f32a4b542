//! Structural analysis of listing pages.
//!
//! Both the learner and the Direct scraper locate per-venue "containers"
//! through [`find_containers`], so a pattern learned relative to a
//! container is applied relative to the same kind of container later.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static ANY_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("valid selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static LIST_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul, ol, dl").expect("valid selector"));
static TABLE_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));

/// Common list/card/article selectors, highest priority first.
pub const CONTAINER_SELECTORS: &[&str] = &[
    "[itemtype*='LocalBusiness']",
    "[itemtype*='Place']",
    "[data-location]",
    ".location",
    ".booth",
    ".venue",
    ".listing",
    ".card",
    "article",
    "tbody tr",
    "ul li",
    "ol li",
];

/// Tags whose repetition suggests a list of items.
const ITEM_TAGS: &[&str] = &["article", "li", "tr", "section", "dt"];

/// Minimum occurrences for a class or tag to count as repeated.
const MIN_REPEATS: usize = 2;

/// Element text shorter than this is not treated as a venue container.
const MIN_CONTAINER_TEXT: usize = 3;

/// What the page looks like structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStructure {
    /// Classes used by at least two elements, most frequent first.
    pub repeated_classes: Vec<(String, usize)>,
    /// Item-like tags (`article`, `li`, `tr`, ...) occurring at least twice.
    pub repeated_tags: Vec<(String, usize)>,
    pub has_list: bool,
    pub has_table: bool,
    /// Distinct `data-*` attribute names, sorted.
    pub data_attributes: Vec<String>,
}

/// Enumerate repeated classes, repeated item tags, list/table wrappers and
/// data attributes.
#[must_use]
pub fn analyze_structure(document: &Html) -> PageStructure {
    let mut classes: BTreeMap<String, usize> = BTreeMap::new();
    let mut tags: BTreeMap<String, usize> = BTreeMap::new();
    let mut data_attributes = BTreeSet::new();

    for element in document.select(&ANY_ELEMENT) {
        let value = element.value();
        for class in value.classes() {
            *classes.entry(class.to_string()).or_default() += 1;
        }
        let name = value.name();
        if ITEM_TAGS.contains(&name) {
            *tags.entry(name.to_string()).or_default() += 1;
        }
        for (attr, _) in value.attrs() {
            if attr.starts_with("data-") {
                data_attributes.insert(attr.to_string());
            }
        }
    }

    PageStructure {
        repeated_classes: ranked(classes),
        repeated_tags: ranked(tags),
        has_list: document.select(&LIST_WRAPPER).next().is_some(),
        has_table: document.select(&TABLE_WRAPPER).next().is_some(),
        data_attributes: data_attributes.into_iter().collect(),
    }
}

fn ranked(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut repeated: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_REPEATS)
        .collect();
    // Stable sort keeps alphabetical order among equal counts.
    repeated.sort_by(|a, b| b.1.cmp(&a.1));
    repeated
}

/// Per-venue elements found on a page.
#[derive(Debug)]
pub struct Containers<'a> {
    /// Selector that produced the containers; `None` means the whole page
    /// is a single container.
    pub selector: Option<String>,
    pub elements: Vec<ElementRef<'a>>,
}

impl Containers<'_> {
    #[must_use]
    pub fn is_whole_page(&self) -> bool {
        self.selector.is_none()
    }
}

/// Locate repeated container elements.
///
/// Tries [`CONTAINER_SELECTORS`] in order, then the page's repeated
/// classes. A selector wins when it yields at least two non-empty
/// elements. If nothing does, the document body (or root) is the single
/// container.
#[must_use]
pub fn find_containers(document: &Html) -> Containers<'_> {
    for selector in CONTAINER_SELECTORS {
        if let Some(elements) = repeated_matches(document, selector) {
            return Containers {
                selector: Some((*selector).to_string()),
                elements,
            };
        }
    }

    let structure = analyze_structure(document);
    for (class, _) in &structure.repeated_classes {
        if !is_css_identifier(class) {
            continue;
        }
        let selector = format!(".{class}");
        if let Some(elements) = repeated_matches(document, &selector) {
            return Containers {
                selector: Some(selector),
                elements,
            };
        }
    }

    let whole = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    Containers {
        selector: None,
        elements: vec![whole],
    }
}

fn repeated_matches<'a>(document: &'a Html, selector: &str) -> Option<Vec<ElementRef<'a>>> {
    let parsed = Selector::parse(selector).ok()?;
    let elements: Vec<ElementRef<'a>> = document
        .select(&parsed)
        .filter(|el| element_text(*el).chars().count() >= MIN_CONTAINER_TEXT)
        .collect();
    // A class wrapping the entire list is not a per-venue container.
    let nested = elements
        .iter()
        .any(|outer| elements.iter().any(|inner| is_strict_ancestor(*outer, *inner)));
    (elements.len() >= MIN_REPEATS && !nested).then_some(elements)
}

fn is_strict_ancestor(outer: ElementRef<'_>, inner: ElementRef<'_>) -> bool {
    inner.ancestors().any(|node| node.id() == outer.id())
}

/// Inline text of an element with whitespace collapsed.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element with one line per text node, for regex patterns.
#[must_use]
pub fn block_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when `s` can be used verbatim after `.` or `#` in a selector.
#[must_use]
pub fn is_css_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some('-') => match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        },
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
