//! Tagged genome text format.
//!
//! Genomes persist as a tree of tagged nodes:
//!
//! ```text
//! <genome>
//!   <name>swimmer</name>
//!   <gene>
//!     <type>core</type>
//!     <orientation>1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1</orientation>
//!     <channel><chemical>1</chemical><constant>0</constant></channel>
//!     <gene>
//!       <type>CellTypes:fin.default</type>
//!       <socket>skt0</socket>
//!       ...
//!     </gene>
//!   </gene>
//! </genome>
//! ```
//!
//! Inside a gene, `<type>` must come first. `<socket>`, `<orientation>` and
//! `<channel>` follow in any order, and nested `<gene>` nodes are its
//! children in order. Any other tag is an error, as is text outside a leaf
//! tag, a missing closing tag or a non-numeric value. Parsing never returns
//! a partial genome. Leaf text is taken verbatim, so names keep any edge
//! whitespace; numeric leaves are trimmed before parsing.
//!
//! Orientation holds 16 comma-separated floats, one matrix row after
//! another, with translation in the last row. That row-major layout over
//! row vectors is the same memory order as a column-major matrix over
//! column vectors, so it maps straight onto [`Mat4::from_cols_array`]. A
//! trailing comma is accepted but not required.

use crate::error::{IoError, Result};
use morphogen_data::{ChannelGene, Gene, Genome, Mat4};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Text(String),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| IoError::parse("comment", "unterminated comment", line))?;
            line += after[..end].matches('\n').count();
            rest = &after[end + 3..];
        } else if let Some(after) = rest.strip_prefix('<') {
            let end = after
                .find('>')
                .ok_or_else(|| IoError::parse("?", truncate(rest), line))?;
            let inner = after[..end].trim();
            let token = match inner.strip_prefix('/') {
                Some(name) => Token::Close(name.trim().to_string()),
                None => Token::Open(inner.to_string()),
            };
            if matches!(&token, Token::Open(n) | Token::Close(n) if !is_tag_name(n)) {
                return Err(IoError::parse(inner, "malformed tag", line));
            }
            tokens.push(Spanned { token, line });
            line += after[..end].matches('\n').count();
            rest = &after[end + 1..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let raw = &rest[..end];
            // leaf content is kept verbatim, whitespace between tags is not
            let in_leaf = matches!(tokens.last(), Some(Spanned { token: Token::Open(_), .. }))
                && rest[end..].starts_with("</");
            if in_leaf || !raw.trim().is_empty() {
                let leading = &raw[..raw.len() - raw.trim_start().len()];
                tokens.push(Spanned {
                    token: Token::Text(unescape(raw)),
                    line: line + leading.matches('\n').count(),
                });
            }
            line += raw.matches('\n').count();
            rest = &rest[end..];
        }
    }
    Ok(tokens)
}

fn is_tag_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn truncate(fragment: &str) -> String {
    fragment.chars().take(32).collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Line of the last consumed token, for end-of-input diagnostics.
    line: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            line: 1,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let spanned = self.tokens.get(self.pos)?;
        self.pos += 1;
        self.line = spanned.line;
        Some(spanned.token.clone())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect_open(&mut self, tag: &str) -> Result<()> {
        match self.next() {
            Some(Token::Open(name)) if name == tag => Ok(()),
            Some(other) => Err(IoError::parse(tag, describe(&other), self.line)),
            None => Err(IoError::parse(tag, "unexpected end of input", self.line)),
        }
    }

    fn expect_close(&mut self, tag: &str) -> Result<()> {
        match self.next() {
            Some(Token::Close(name)) if name == tag => Ok(()),
            Some(other) => Err(IoError::parse(
                tag,
                format!("expected </{tag}>, found {}", describe(&other)),
                self.line,
            )),
            None => Err(IoError::parse(tag, format!("missing </{tag}>"), self.line)),
        }
    }

    /// Text content of a leaf tag whose opening tag was just consumed.
    fn leaf(&mut self, tag: &str) -> Result<String> {
        let text = match self.next() {
            Some(Token::Text(text)) => text,
            Some(Token::Close(name)) if name == tag => return Ok(String::new()),
            Some(other) => return Err(IoError::parse(tag, describe(&other), self.line)),
            None => return Err(IoError::parse(tag, format!("missing </{tag}>"), self.line)),
        };
        self.expect_close(tag)?;
        Ok(text)
    }

    fn genome(&mut self, fallback_name: &str) -> Result<Genome> {
        self.expect_open("genome")?;
        let mut name = None;
        let mut root = None;
        loop {
            match self.next() {
                Some(Token::Open(tag)) if tag == "name" => {
                    if name.is_some() {
                        return Err(IoError::parse("name", "duplicate <name>", self.line));
                    }
                    name = Some(self.leaf("name")?);
                }
                Some(Token::Open(tag)) if tag == "gene" => {
                    if root.is_some() {
                        return Err(IoError::parse("genome", "more than one root gene", self.line));
                    }
                    root = Some(self.gene()?);
                }
                Some(Token::Close(tag)) if tag == "genome" => break,
                Some(other) => return Err(IoError::parse("genome", describe(&other), self.line)),
                None => return Err(IoError::parse("genome", "missing </genome>", self.line)),
            }
        }
        let root = root.ok_or_else(|| IoError::parse("genome", "no root gene", self.line))?;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
        Ok(Genome::new(name, root))
    }

    /// A gene whose opening tag was just consumed.
    fn gene(&mut self) -> Result<Gene> {
        let start = self.line;
        match self.next() {
            Some(Token::Open(tag)) if tag == "type" => {}
            Some(other) => {
                return Err(IoError::parse(
                    "gene",
                    format!("<type> must come first, found {}", describe(&other)),
                    self.line,
                ))
            }
            None => return Err(IoError::parse("gene", "missing </gene>", start)),
        }
        let mut gene = Gene::new(self.leaf("type")?);
        if gene.type_name.trim().is_empty() {
            return Err(IoError::parse("type", "empty type name", self.line));
        }

        loop {
            match self.next() {
                Some(Token::Open(tag)) => match tag.as_str() {
                    "socket" => {
                        if gene.socket.is_some() {
                            return Err(IoError::parse("socket", "duplicate <socket>", self.line));
                        }
                        gene.socket = Some(self.leaf("socket")?);
                    }
                    "orientation" => {
                        let line = self.line;
                        let text = self.leaf("orientation")?;
                        gene.orientation = parse_matrix(&text)
                            .map_err(|fragment| IoError::parse("orientation", fragment, line))?;
                    }
                    "channel" => gene.channels.push(self.channel()?),
                    "gene" => gene.children.push(self.gene()?),
                    "type" => {
                        return Err(IoError::parse("type", "duplicate <type>", self.line));
                    }
                    _ => return Err(IoError::parse(tag, "unknown tag in <gene>", self.line)),
                },
                Some(Token::Close(tag)) if tag == "gene" => return Ok(gene),
                Some(other) => return Err(IoError::parse("gene", describe(&other), self.line)),
                None => return Err(IoError::parse("gene", "missing </gene>", start)),
            }
        }
    }

    /// A channel whose opening tag was just consumed.
    fn channel(&mut self) -> Result<ChannelGene> {
        let mut channel = ChannelGene::new(0, 0.0);
        loop {
            match self.next() {
                Some(Token::Open(tag)) if tag == "chemical" => {
                    let line = self.line;
                    let text = self.leaf("chemical")?;
                    channel.chemical = text
                        .trim()
                        .parse()
                        .map_err(|_| IoError::parse("chemical", text.clone(), line))?;
                }
                Some(Token::Open(tag)) if tag == "constant" => {
                    let line = self.line;
                    let text = self.leaf("constant")?;
                    channel.constant = text
                        .trim()
                        .parse()
                        .map_err(|_| IoError::parse("constant", text.clone(), line))?;
                }
                Some(Token::Close(tag)) if tag == "channel" => return Ok(channel),
                Some(other) => return Err(IoError::parse("channel", describe(&other), self.line)),
                None => return Err(IoError::parse("channel", "missing </channel>", self.line)),
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Open(tag) => format!("unexpected <{tag}>"),
        Token::Close(tag) => format!("unexpected </{tag}>"),
        Token::Text(text) => format!("unexpected text \"{}\"", truncate(text)),
    }
}

/// Parses 16 comma-separated floats. On failure returns the offending fragment.
fn parse_matrix(text: &str) -> std::result::Result<Mat4, String> {
    let mut parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    if parts.len() != 16 {
        return Err(format!("expected 16 values, found {}", parts.len()));
    }
    let mut values = [0.0f32; 16];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| (*part).to_string())?;
        if !slot.is_finite() {
            return Err((*part).to_string());
        }
    }
    Ok(Mat4::from_cols_array(&values))
}

/// Parses a complete `<genome>` document.
///
/// `fallback_name` names the genome when the text carries no `<name>`,
/// typically the file stem.
pub fn read_genome(text: &str, fallback_name: &str) -> Result<Genome> {
    let mut parser = Parser::new(tokenize(text)?);
    let genome = parser.genome(fallback_name)?;
    if let Some(extra) = parser.next() {
        return Err(IoError::parse("genome", describe(&extra), parser.line));
    }
    genome
        .validate()
        .map_err(|e| IoError::validation(format!("{e:#}")))?;
    Ok(genome)
}

/// Parses a bare `<gene>` tree, without the genome wrapper.
pub fn read_gene(text: &str) -> Result<Gene> {
    let mut parser = Parser::new(tokenize(text)?);
    parser.expect_open("gene")?;
    let gene = parser.gene()?;
    if !parser.at_end() {
        let extra = parser.next().map(|t| describe(&t)).unwrap_or_default();
        return Err(IoError::parse("gene", extra, parser.line));
    }
    Ok(gene)
}

/// Writes a genome in the tagged text format.
#[must_use]
pub fn write_genome(genome: &Genome) -> String {
    let mut out = String::new();
    out.push_str("<genome>\n");
    let _ = writeln!(out, "  <name>{}</name>", escape(&genome.name));
    write_gene_into(&mut out, &genome.root, 1);
    out.push_str("</genome>\n");
    out
}

/// Writes a single gene subtree.
#[must_use]
pub fn write_gene(gene: &Gene) -> String {
    let mut out = String::new();
    write_gene_into(&mut out, gene, 0);
    out
}

fn write_gene_into(out: &mut String, gene: &Gene, depth: usize) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{pad}<gene>");
    let _ = writeln!(out, "{pad}  <type>{}</type>", escape(&gene.type_name));
    if let Some(socket) = &gene.socket {
        let _ = writeln!(out, "{pad}  <socket>{}</socket>", escape(socket));
    }
    let values: Vec<String> = gene
        .orientation
        .to_cols_array()
        .iter()
        .map(|v| v.to_string())
        .collect();
    let _ = writeln!(out, "{pad}  <orientation>{}</orientation>", values.join(","));
    for channel in &gene.channels {
        let _ = writeln!(
            out,
            "{pad}  <channel><chemical>{}</chemical><constant>{}</constant></channel>",
            channel.chemical, channel.constant
        );
    }
    for child in &gene.children {
        write_gene_into(out, child, depth + 1);
    }
    let _ = writeln!(out, "{pad}</gene>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphogen_data::Vec3;

    fn sample() -> Genome {
        Genome::new(
            "swimmer",
            Gene::new("core")
                .with_channel(1, 0.0)
                .with_channel(0, 0.25)
                .with_child(
                    Gene::new("CellTypes:spine.large")
                        .with_socket("skt0")
                        .with_orientation(Mat4::from_rotation_z(0.3))
                        .with_child(Gene::new("fin").with_socket("skt0")),
                )
                .with_child(
                    Gene::new("sensor")
                        .with_socket("skt1")
                        .with_orientation(Mat4::from_translation(Vec3::new(0.5, -1.0, 2.0))),
                ),
        )
    }

    #[test]
    fn test_write_then_read_is_lossless() {
        let genome = sample();
        let text = write_genome(&genome);
        let back = read_genome(&text, "unused").unwrap();
        assert_eq!(back.name, "swimmer");
        assert!(back.root.approx_eq(&genome.root, 1e-6));
        assert_eq!(back.root.children[0].children[0].type_name, "fin");
        assert_eq!(back.root.children[1].socket.as_deref(), Some("skt1"));
    }

    #[test]
    fn test_translation_is_last_row() {
        let text = "<gene><type>core</type>\
            <orientation>1,0,0,0, 0,1,0,0, 0,0,1,0, 3,4,5,1</orientation></gene>";
        let gene = read_gene(text).unwrap();
        assert_eq!(gene.orientation.w_axis.truncate(), Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_trailing_comma_and_default_orientation() {
        let text = "<gene><type>a</type><orientation>1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1,</orientation>\
            <gene><type>b</type><socket>skt0</socket></gene></gene>";
        let gene = read_gene(text).unwrap();
        assert_eq!(gene.orientation, Mat4::IDENTITY);
        assert_eq!(gene.children[0].orientation, Mat4::IDENTITY);
    }

    #[test]
    fn test_siblings_keep_order() {
        let text = "<gene><type>root</type>\
            <gene><type>a</type><socket>skt0</socket></gene>\
            <gene><type>b</type><socket>skt1</socket></gene>\
            <gene><type>c</type><socket>skt2</socket></gene></gene>";
        let gene = read_gene(text).unwrap();
        let names: Vec<_> = gene.children.iter().map(|g| g.type_name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_type_must_come_first() {
        let err = read_gene("<gene><socket>skt0</socket><type>a</type></gene>").unwrap_err();
        assert!(matches!(err, IoError::Parse { ref tag, .. } if tag == "gene"));
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let err = read_gene("<gene><type>a</type><colour>red</colour></gene>").unwrap_err();
        assert!(matches!(err, IoError::Parse { ref tag, .. } if tag == "colour"));
    }

    #[test]
    fn test_bad_matrix_value_names_fragment() {
        let text = "<gene><type>a</type>\n<orientation>1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,one</orientation></gene>";
        match read_gene(text).unwrap_err() {
            IoError::Parse { tag, fragment, line } => {
                assert_eq!(tag, "orientation");
                assert_eq!(fragment, "one");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_short_matrix_rejected() {
        assert!(read_gene("<gene><type>a</type><orientation>1,0,0</orientation></gene>").is_err());
    }

    #[test]
    fn test_missing_close_tag() {
        let err = read_genome("<genome><gene><type>a</type>", "x").unwrap_err();
        assert!(matches!(err, IoError::Parse { .. }));
    }

    #[test]
    fn test_mismatched_close_tag() {
        assert!(read_gene("<gene><type>a</socket></gene>").is_err());
    }

    #[test]
    fn test_non_root_without_socket_fails_validation() {
        let text = "<genome><gene><type>a</type><gene><type>b</type></gene></gene></genome>";
        assert!(matches!(read_genome(text, "x"), Err(IoError::Validation(_))));
    }

    #[test]
    fn test_fallback_name_and_comments() {
        let text = "<!-- saved by hand -->\n<genome>\n  <gene><type>a</type></gene>\n</genome>\n";
        let genome = read_genome(text, "from_file").unwrap();
        assert_eq!(genome.name, "from_file");
    }

    #[test]
    fn test_escaped_names_round_trip() {
        let genome = Genome::new("a<b>&c", Gene::new("core"));
        let back = read_genome(&write_genome(&genome), "x").unwrap();
        assert_eq!(back.name, "a<b>&c");
    }

    #[test]
    fn test_two_root_genes_rejected() {
        let text = "<genome><gene><type>a</type></gene><gene><type>b</type></gene></genome>";
        assert!(read_genome(text, "x").is_err());
    }

    #[test]
    fn test_trailing_content_rejected() {
        let text = "<genome><gene><type>a</type></gene></genome><gene>";
        assert!(read_genome(text, "x").is_err());
    }
}
