use crate::hit::HitRecord;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    sequence::delimited,
    IResult,
};
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Line offsets, relative to the `>>` header, inside one hit block
const METADATA_OFFSET: usize = 3;
const STRUCTURE_OFFSET: usize = 6;
const SEQUENCE_OFFSET: usize = 9;

/// Open a file and auto-detect bgzip compression, returning a boxed BufRead
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(bgzf::io::reader::Reader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// `(12)` -> 12
fn rank_token(input: &str) -> IResult<&str, u32> {
    delimited(char('('), map_res(digit1, str::parse), char(')'))(input)
}

/// Hit summary line of a cmsearch alignment block, e.g.
/// `(1) !   1.2e-20   80.1   0.0  cm  1  250 []  10  300 + ..  0.95  no 0.45`
#[derive(Debug, Clone, PartialEq)]
struct HitSummary {
    rank: u32,
    e_value: f64,
    score: f64,
    bias: f64,
    start: usize,
    end: usize,
    cm_accuracy: f64,
    gc: f64,
    // Raw coordinate tokens, needed to slice badly spaced sequence lines
    start_token: String,
    end_token: String,
}

impl HitSummary {
    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 16 {
            bail!(
                "hit summary has {} fields, expected at least 16",
                fields.len()
            );
        }

        let (_, rank) = all_consuming(rank_token)(fields[0])
            .map_err(|e| anyhow!("invalid rank '{}': {e}", fields[0]))?;

        let float = |idx: usize, what: &str| -> Result<f64> {
            fields[idx]
                .parse::<f64>()
                .with_context(|| format!("invalid {what} '{}'", fields[idx]))
        };
        let coord = |idx: usize, what: &str| -> Result<usize> {
            fields[idx]
                .parse::<usize>()
                .with_context(|| format!("invalid {what} '{}'", fields[idx]))
        };

        Ok(HitSummary {
            rank,
            e_value: float(2, "E-value")?,
            score: float(3, "score")?,
            bias: float(4, "bias")?,
            start: coord(9, "sequence start")?,
            end: coord(10, "sequence end")?,
            cm_accuracy: float(13, "accuracy")?,
            gc: float(15, "GC fraction")?,
            start_token: fields[9].to_string(),
            end_token: fields[10].to_string(),
        })
    }
}

/// Structure annotation is the first token of its line (`::<<<___>>> CS`)
fn structure_from_line(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}

/// Pull the aligned residues out of `  name  start  RESIDUES  end`.
///
/// Truncation tokens contain spaces (`*[ 12]*`), so the residues are the
/// middle tokens re-joined with single spaces. When the line held runs of
/// spaces the re-joined text no longer occurs in the line; then the residues
/// are cut out between the literal start and end coordinate tokens instead.
fn sequence_from_line(line: &str, summary: &HitSummary, line_number: usize) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let sequence = if tokens.len() > 3 {
        tokens[2..tokens.len() - 1].join(" ")
    } else {
        String::new()
    };

    if !sequence.is_empty() && line.contains(&sequence) {
        return sequence;
    }

    debug!("Fallback sequence extraction on line {line_number}");
    let left = line
        .rsplit_once(summary.end_token.as_str())
        .map(|(left, _)| left)
        .unwrap_or(line);
    let start_marker = format!("{} ", summary.start_token);
    left.split(start_marker.as_str())
        .last()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Hit block being assembled while its lines stream past
struct PendingHit {
    header_line: usize,
    name: String,
    summary: Option<HitSummary>,
    structure: Option<String>,
}

/// Streaming reader for INFERNAL cmsearch/cmscan text output
pub struct InfernalReader<R: BufRead> {
    reader: R,
    line_number: usize,
    pending: Option<PendingHit>,
}

impl<R: BufRead> InfernalReader<R> {
    pub fn new(reader: R) -> Self {
        InfernalReader {
            reader,
            line_number: 0,
            pending: None,
        }
    }

    /// Read the next complete hit block, or `None` at end of input.
    ///
    /// Blocks with an unreadable summary or that end before their sequence
    /// line are skipped with a warning; they never end the parse.
    pub fn read_record(&mut self) -> Result<Option<HitRecord>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                if let Some(pending) = self.pending.take() {
                    warn!(
                        "Hit {} (line {}) ends before its sequence line; skipped",
                        pending.name, pending.header_line
                    );
                }
                return Ok(None);
            }
            let line_number = self.line_number;
            self.line_number += 1;
            let text = line.trim_end_matches(['\n', '\r']);

            if text.starts_with(">>") {
                if let Some(previous) = self.pending.take() {
                    warn!(
                        "Hit {} (line {}) is incomplete; skipped",
                        previous.name, previous.header_line
                    );
                }
                let name = text.split(' ').nth(1).unwrap_or("").trim().to_string();
                self.pending = Some(PendingHit {
                    header_line: line_number,
                    name,
                    summary: None,
                    structure: None,
                });
                continue;
            }

            let Some(pending) = self.pending.as_mut() else {
                continue;
            };
            let offset = line_number - pending.header_line;

            if offset == METADATA_OFFSET {
                match HitSummary::parse(text) {
                    Ok(summary) => pending.summary = Some(summary),
                    Err(e) => {
                        warn!(
                            "Hit {} (line {line_number}): {e}; skipped",
                            pending.name
                        );
                        self.pending = None;
                    }
                }
            } else if offset == STRUCTURE_OFFSET {
                pending.structure = structure_from_line(text);
            } else if offset == SEQUENCE_OFFSET {
                if let Some(record) = self.finish(text, line_number) {
                    return Ok(Some(record));
                }
            }
        }
    }

    fn finish(&mut self, line: &str, line_number: usize) -> Option<HitRecord> {
        let pending = self.pending.take()?;
        let Some(summary) = pending.summary else {
            warn!("Hit {} has no summary line; skipped", pending.name);
            return None;
        };
        let structure = pending.structure.unwrap_or_default();
        let sequence = sequence_from_line(line, &summary, line_number);

        let parse_error = sequence.len() != structure.len();
        if parse_error {
            warn!(
                "Parsing error on line {line_number} ({}): sequence length {} != structure length {}\n{line}\n{sequence}\n{structure}",
                pending.name,
                sequence.len(),
                structure.len()
            );
        }

        Some(HitRecord {
            name: pending.name,
            rank: summary.rank,
            e_value: summary.e_value,
            score: summary.score,
            bias: summary.bias,
            start: summary.start,
            end: summary.end,
            cm_accuracy: summary.cm_accuracy,
            gc: summary.gc,
            sequence,
            structure,
            parse_error,
        })
    }

    pub fn read_all(&mut self) -> Result<Vec<HitRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Parse an in-memory report
pub fn parse_report(text: &str) -> Result<Vec<HitRecord>> {
    InfernalReader::new(text.as_bytes()).read_all()
}

/// Read a report from file (auto-detects bgzip compression)
pub fn read_report_file<P: AsRef<Path>>(path: P) -> Result<Vec<HitRecord>> {
    let input = open_input(path)?;
    let mut reader = InfernalReader::new(input);
    reader.read_all()
}
