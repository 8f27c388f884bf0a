use crate::doc_processor::PdfChunk;

pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Default budget, well under the input window of the hosted models.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 3_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub included_pages: Vec<u32>,
    pub omitted_pages: Vec<u32>,
}

impl AssembledContext {
    pub fn is_truncated(&self) -> bool {
        !self.omitted_pages.is_empty()
    }
}

fn render_page(chunk: &PdfChunk) -> String {
    format!("Page {}:\n{}", chunk.page_number, chunk.content)
}

/// Join every chunk as `Page <n>:\n<content>`, separated by a delimiter
pub fn assemble(chunks: &[PdfChunk]) -> String {
    chunks
        .iter()
        .map(render_page)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Assemble context without exceeding `max_chars`.
///
/// Whole pages are taken in page order until the next one would not fit;
/// the remaining pages are reported as omitted. The first page is always
/// included, cut to the budget if it alone is too large.
pub fn assemble_within(chunks: &[PdfChunk], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut included_pages = Vec::new();
    let mut omitted_pages = Vec::new();
    let mut used = 0usize;

    for chunk in chunks {
        if !omitted_pages.is_empty() {
            omitted_pages.push(chunk.page_number);
            continue;
        }

        let page = render_page(chunk);
        let sep = if included_pages.is_empty() { 0 } else { PAGE_SEPARATOR.chars().count() };
        let page_len = page.chars().count();

        if used + sep + page_len <= max_chars {
            if sep > 0 {
                text.push_str(PAGE_SEPARATOR);
            }
            text.push_str(&page);
            used += sep + page_len;
            included_pages.push(chunk.page_number);
        } else if included_pages.is_empty() {
            text.extend(page.chars().take(max_chars));
            included_pages.push(chunk.page_number);
            used = max_chars;
        } else {
            omitted_pages.push(chunk.page_number);
        }
    }

    if !omitted_pages.is_empty() {
        log::warn!(
            "Context budget of {} chars reached; omitting {} of {} pages",
            max_chars,
            omitted_pages.len(),
            chunks.len()
        );
    }

    AssembledContext {
        text,
        included_pages,
        omitted_pages,
    }
}
