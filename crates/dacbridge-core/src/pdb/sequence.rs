//! Sequence points and source documents.

use std::fmt;

/// Line number marking a sequence point that has no source position.
pub const HIDDEN_LINE: u32 = 0x00fe_efee;

/// Identifier of a document inside one symbol file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u32);

/// A source document referenced by a symbol file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDocument
{
    /// Reader-specific identifier
    pub id: DocumentId,
    /// Document URL, usually the full path at build time
    pub url: String,
}

impl SymbolDocument
{
    /// Document `url` with the given id.
    pub fn new(id: u32, url: impl Into<String>) -> Self
    {
        Self {
            id: DocumentId(id),
            url: url.into(),
        }
    }

    /// Whether this document is the source file `file`.
    ///
    /// Matches when the URL equals `file`, or ends with `/` or `\` followed
    /// by `file`. Case is ignored.
    ///
    /// ```rust
    /// use dacbridge_core::pdb::sequence::SymbolDocument;
    ///
    /// let doc = SymbolDocument::new(1, r"C:\src\App\Program.cs");
    /// assert!(doc.matches_file("program.cs"));
    /// assert!(doc.matches_file(r"App\Program.cs"));
    /// assert!(!doc.matches_file("gram.cs"));
    /// ```
    pub fn matches_file(&self, file: &str) -> bool
    {
        if file.is_empty() {
            return false;
        }
        let url = self.url.as_str();
        if url.len() == file.len() {
            return eq_ignore_case(url, file);
        }
        let Some(split) = url.len().checked_sub(file.len()) else {
            return false;
        };
        if split == 0 || !url.is_char_boundary(split) {
            return false;
        }
        let (head, tail) = url.split_at(split);
        head.ends_with(['/', '\\']) && eq_ignore_case(tail, file)
    }
}

impl fmt::Display for SymbolDocument
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.url)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool
{
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Mapping of one IL offset to a source span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint
{
    /// IL offset the span starts at
    pub il_offset: u32,
    /// First line ([`HIDDEN_LINE`] for hidden points)
    pub line: u32,
    /// First column
    pub column: u32,
    /// Last line
    pub end_line: u32,
    /// Last column
    pub end_column: u32,
    /// Document the span is in
    pub document: SymbolDocument,
}

impl SequencePoint
{
    /// Point covering a single line, without column information.
    pub fn at(il_offset: u32, line: u32, document: SymbolDocument) -> Self
    {
        Self {
            il_offset,
            line,
            column: 0,
            end_line: line,
            end_column: 0,
            document,
        }
    }

    /// `true` when the point has no source position.
    pub const fn is_hidden(&self) -> bool
    {
        self.line == HIDDEN_LINE
    }
}

/// Sequence points of one method, ordered by IL offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencePointTable
{
    points: Vec<SequencePoint>,
}

impl SequencePointTable
{
    /// Sort `points` by IL offset, keeping the reader's order among equals.
    pub fn new(mut points: Vec<SequencePoint>) -> Self
    {
        points.sort_by_key(|point| point.il_offset);
        Self { points }
    }

    /// The points in offset order.
    pub fn points(&self) -> &[SequencePoint]
    {
        &self.points
    }

    /// `true` when the method has no points at all.
    pub fn is_empty(&self) -> bool
    {
        self.points.is_empty()
    }

    /// The last visible point at or before `il_offset`.
    pub fn line_for_offset(&self, il_offset: u32) -> Option<&SequencePoint>
    {
        let mut best = None;
        for point in &self.points {
            if point.il_offset > il_offset {
                break;
            }
            if !point.is_hidden() {
                best = Some(point);
            }
        }
        best
    }
}
