//! Main-content region detection
//!
//! Documentation pages wrap their content in very different markup, so the
//! region is found by a chain of strategies tried in order. The chain always
//! ends in a deterministic fallback, which keeps the result testable.

use scraper::{ElementRef, Html, Selector};

/// Semantic containers tried by [`SemanticLocator`], in order
pub const SEMANTIC_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    ".theme-doc-markdown",
    ".markdown",
    ".document-content",
    ".content",
];

/// Block-level children counted by [`DensestDivLocator`]
const DENSITY_TAGS: &[&str] = &[
    "p", "pre", "ul", "ol", "table", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// A strategy for finding the main-content region of a document
pub trait ContentLocator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the content region, or None to defer to the next strategy
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// Number of non-whitespace characters of text in a subtree
pub fn text_len(element: ElementRef<'_>) -> usize {
    element
        .text()
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .count()
}

/// Uses user-configured CSS selectors; the first one with text wins
pub struct SelectorLocator {
    selectors: Vec<Selector>,
}

impl SelectorLocator {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }
}

impl ContentLocator for SelectorLocator {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .find(|element| text_len(*element) > 0)
        })
    }
}

/// Looks for semantic containers and common documentation-theme classes
///
/// A candidate is only accepted when it holds more than `min_chars`
/// characters of text, so an empty `<main>` shell does not win over the
/// real content.
pub struct SemanticLocator {
    selectors: Vec<Selector>,
    min_chars: usize,
}

impl SemanticLocator {
    pub fn new(min_chars: usize) -> Self {
        let selectors = SEMANTIC_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        Self {
            selectors,
            min_chars,
        }
    }
}

impl ContentLocator for SemanticLocator {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .find(|element| text_len(*element) > self.min_chars)
        })
    }
}

/// Picks the `div` with the most text in its direct block children
///
/// Scoring direct children rather than the whole subtree keeps outer
/// layout wrappers from always winning. Ties go to the first div in
/// document order.
pub struct DensestDivLocator {
    min_chars: usize,
}

impl DensestDivLocator {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    fn score(div: ElementRef<'_>) -> usize {
        div.children()
            .map(|child| match ElementRef::wrap(child) {
                Some(element) if DENSITY_TAGS.contains(&element.value().name()) => {
                    text_len(element)
                }
                Some(_) => 0,
                None => child
                    .value()
                    .as_text()
                    .map(|text| text.chars().filter(|c| !c.is_whitespace()).count())
                    .unwrap_or(0),
            })
            .sum()
    }
}

impl ContentLocator for DensestDivLocator {
    fn name(&self) -> &'static str {
        "densest-div"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse("div").ok()?;

        let mut best: Option<(ElementRef<'a>, usize)> = None;
        for div in document.select(&selector) {
            let score = Self::score(div);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((div, score));
            }
        }

        best.filter(|(_, score)| *score > self.min_chars)
            .map(|(div, _)| div)
    }
}

/// Deterministic last resort: `<body>`, or the document root
pub struct BodyLocator;

impl ContentLocator for BodyLocator {
    fn name(&self) -> &'static str {
        "body"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse("body").ok()?;
        document
            .select(&selector)
            .next()
            .or_else(|| Some(document.root_element()))
    }
}

/// An ordered list of strategies
pub struct LocatorChain {
    locators: Vec<Box<dyn ContentLocator>>,
}

impl LocatorChain {
    /// Builds the standard chain
    ///
    /// 1. configured selectors (skipped when none are given)
    /// 2. semantic containers
    /// 3. densest div
    /// 4. body
    pub fn standard(selectors: Vec<Selector>, min_chars: usize) -> Self {
        let mut locators: Vec<Box<dyn ContentLocator>> = Vec::new();
        if !selectors.is_empty() {
            locators.push(Box::new(SelectorLocator::new(selectors)));
        }
        locators.push(Box::new(SemanticLocator::new(min_chars)));
        locators.push(Box::new(DensestDivLocator::new(min_chars)));
        locators.push(Box::new(BodyLocator));
        Self { locators }
    }

    /// Builds a chain from custom strategies
    ///
    /// [`BodyLocator`] is always appended so the chain cannot come up empty.
    pub fn new(mut locators: Vec<Box<dyn ContentLocator>>) -> Self {
        locators.push(Box::new(BodyLocator));
        Self { locators }
    }

    /// Returns the content region and the name of the strategy that found it
    pub fn locate<'a>(&self, document: &'a Html) -> (ElementRef<'a>, &'static str) {
        for locator in &self.locators {
            if let Some(region) = locator.locate(document) {
                return (region, locator.name());
            }
        }
        (document.root_element(), "root")
    }
}
