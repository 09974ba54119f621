//! Heading-aware document segmenter.
//!
//! Splits Markdown text into [`SectionDraft`]s, one per heading-bounded run
//! of top-level blocks. Each section is prefixed with the heading lines of its
//! ancestors so that a retrieved section still says where it came from.
//!
//! # Algorithm
//!
//! 1. Parse the text with `pulldown-cmark` and collect the top-level blocks
//!    as [`Block`]s, each carrying its source slice.
//! 2. Drop [`BlockKind::Embedded`] blocks (raw HTML, metadata blocks).
//! 3. Partition the blocks into runs. Every heading starts a new run; blocks
//!    before the first heading form an implicit leading run of depth 0.
//! 4. Walk the runs with an ancestor stack of headings. Before a run, pop
//!    every stack entry whose depth is `>=` the run's depth.
//! 5. Emit the run prefixed with the stack's heading lines. Runs that hold
//!    only a heading are not emitted.
//! 6. Push the run's heading onto the stack.
//!
//! # Example
//!
//! ```rust
//! use lore_core::segment::segment;
//!
//! let sections = segment("# Guide\n## Install\nRun the installer.\n");
//! assert_eq!(sections.len(), 1);
//! assert!(sections[0].content.starts_with("# Guide"));
//! assert_eq!(sections[0].breadcrumb_slug.as_deref(), Some("guide/install"));
//! ```

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::models::SectionDraft;

/// Approximate characters-per-token ratio used for section token counts.
pub const CHARS_PER_TOKEN: usize = 4;

/// Kind of a top-level block node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// ATX or setext heading. `depth` is the heading level, 1 = top level.
    Heading { depth: usize, text: String },
    Paragraph,
    Code,
    /// Raw HTML or a front-matter metadata block. Not portable across
    /// renderers, so it is removed before splitting.
    Embedded,
    /// Lists, block quotes, tables, rules, footnote definitions.
    Other,
}

/// A top-level block with the source text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub source: &'a str,
}

impl Block<'_> {
    fn heading_depth(&self) -> Option<usize> {
        match self.kind {
            BlockKind::Heading { depth, .. } => Some(depth),
            _ => None,
        }
    }
}

/// A heading on the ancestor stack.
#[derive(Debug, Clone)]
struct Ancestor {
    depth: usize,
    line: String,
    slug: String,
}

/// A heading-bounded run of blocks.
#[derive(Debug)]
struct Run<'a> {
    heading: Option<Block<'a>>,
    body: Vec<Block<'a>>,
}

impl Run<'_> {
    fn depth(&self) -> usize {
        self.heading
            .as_ref()
            .and_then(|h| h.heading_depth())
            .unwrap_or(0)
    }

    fn render(&self) -> String {
        self.heading
            .iter()
            .chain(self.body.iter())
            .map(|b| b.source.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Split document text into heading-contextualized sections.
///
/// Deterministic and pure. A document without headings yields exactly one
/// section without a breadcrumb; an empty or whitespace-only document yields
/// none.
pub fn segment(text: &str) -> Vec<SectionDraft> {
    let blocks = strip_embedded(parse_blocks(text));
    let runs = partition_runs(blocks);

    let mut stack: Vec<Ancestor> = Vec::new();
    let mut sections = Vec::new();

    for run in runs {
        let depth = run.depth();
        if stack.last().is_some_and(|top| depth <= top.depth) {
            while stack.last().is_some_and(|top| top.depth >= depth) {
                stack.pop();
            }
        }

        let own = run.heading.as_ref().and_then(ancestor_of);

        if !run.body.is_empty() {
            let body = run.render();
            let breadcrumb = if stack.is_empty() {
                None
            } else {
                Some(
                    stack
                        .iter()
                        .map(|a| a.line.as_str())
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            };
            let content = match &breadcrumb {
                Some(crumb) => format!("{}\n\n{}", crumb, body),
                None => body.clone(),
            };
            let breadcrumb_slug = own.as_ref().map(|o| {
                stack
                    .iter()
                    .map(|a| a.slug.as_str())
                    .chain(std::iter::once(o.slug.as_str()))
                    .collect::<Vec<_>>()
                    .join("/")
            });

            sections.push(SectionDraft {
                content,
                body,
                heading: own.as_ref().map(|o| o.line.clone()),
                breadcrumb,
                breadcrumb_slug,
            });
        }

        if let Some(own) = own {
            stack.push(own);
        }
    }

    sections
}

/// Parse text into its top-level blocks, in document order.
pub fn parse_blocks(text: &str) -> Vec<Block<'_>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options.insert(Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS);

    let mut blocks = Vec::new();
    let mut nesting = 0usize;
    let mut current: Option<(BlockKind, std::ops::Range<usize>)> = None;
    let mut heading_text = String::new();

    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if nesting == 0 {
                    heading_text.clear();
                    current = Some((block_kind(&tag), range));
                }
                nesting += 1;
            }
            Event::End(tag_end) => {
                nesting = nesting.saturating_sub(1);
                if nesting == 0 {
                    if let Some((mut kind, range)) = current.take() {
                        if let (BlockKind::Heading { text: title, .. }, TagEnd::Heading(_)) =
                            (&mut kind, tag_end)
                        {
                            *title = heading_text.trim().to_string();
                        }
                        blocks.push(Block {
                            kind,
                            source: &text[range],
                        });
                    }
                }
            }
            Event::Text(t) | Event::Code(t) if nesting > 0 => {
                if matches!(current, Some((BlockKind::Heading { .. }, _))) {
                    heading_text.push_str(&t);
                }
            }
            Event::Rule if nesting == 0 => blocks.push(Block {
                kind: BlockKind::Other,
                source: &text[range],
            }),
            _ => {}
        }
    }

    blocks
}

fn block_kind(tag: &Tag<'_>) -> BlockKind {
    match tag {
        Tag::Heading { level, .. } => BlockKind::Heading {
            depth: *level as usize,
            text: String::new(),
        },
        Tag::Paragraph => BlockKind::Paragraph,
        Tag::CodeBlock(_) => BlockKind::Code,
        Tag::HtmlBlock | Tag::MetadataBlock(_) => BlockKind::Embedded,
        _ => BlockKind::Other,
    }
}

/// Remove blocks that do not render portably.
pub fn strip_embedded(blocks: Vec<Block<'_>>) -> Vec<Block<'_>> {
    blocks
        .into_iter()
        .filter(|b| b.kind != BlockKind::Embedded)
        .collect()
}

fn partition_runs(blocks: Vec<Block<'_>>) -> Vec<Run<'_>> {
    let mut runs: Vec<Run<'_>> = Vec::new();
    let mut current = Run {
        heading: None,
        body: Vec::new(),
    };

    for block in blocks {
        if block.heading_depth().is_some() {
            if current.heading.is_some() || !current.body.is_empty() {
                runs.push(current);
            }
            current = Run {
                heading: Some(block),
                body: Vec::new(),
            };
        } else {
            current.body.push(block);
        }
    }

    if current.heading.is_some() || !current.body.is_empty() {
        runs.push(current);
    }

    runs
}

fn ancestor_of(block: &Block<'_>) -> Option<Ancestor> {
    match &block.kind {
        BlockKind::Heading { depth, text } => Some(Ancestor {
            depth: *depth,
            line: format!("{} {}", "#".repeat(*depth), text),
            slug: slugify(text),
        }),
        _ => None,
    }
}

/// Lowercase `text`, keep alphanumerics, and collapse everything else into
/// single `-` separators.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Estimate the token count of `text` (4 chars ≈ 1 token, rounded up).
pub fn estimate_tokens(text: &str) -> i64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as i64
}
