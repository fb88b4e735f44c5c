//! Post-processing of Segway annotation BEDs: recoloring rows from their
//! label and swapping integer labels for mnemonics.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::error::SegwayError;

const LABEL_COLUMN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.red, self.green, self.blue)
    }
}

impl FromStr for Rgb {
    type Err = SegwayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|v| u8::try_from(v).ok())
            })
            .collect::<Vec<_>>();
        match parts.as_slice() {
            [Some(red), Some(green), Some(blue)] => Ok(Self::new(*red, *green, *blue)),
            _ => Err(SegwayError::InvalidRgb(value.to_string())),
        }
    }
}

/// Roadmap chromatin state palette,
/// see <https://egg2.wustl.edu/roadmap/web_portal/chr_state_learning.html>.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    DarkKhaki,
    Green,
    GreenYellow,
    MediumAquamarine,
    Orange,
    OrangeRed,
    PaleTurquoise,
    Purple,
    Red,
    Silver,
    White,
    Yellow,
}

impl Color {
    pub const fn rgb(self) -> Rgb {
        match self {
            Color::DarkKhaki => Rgb::new(189, 183, 107),
            Color::Green => Rgb::new(0, 128, 0),
            Color::GreenYellow => Rgb::new(196, 225, 5),
            Color::MediumAquamarine => Rgb::new(102, 205, 170),
            Color::Orange => Rgb::new(255, 195, 77),
            Color::OrangeRed => Rgb::new(255, 68, 0),
            Color::PaleTurquoise => Rgb::new(138, 145, 208),
            Color::Purple => Rgb::new(128, 0, 128),
            Color::Red => Rgb::new(255, 0, 0),
            Color::Silver => Rgb::new(128, 128, 128),
            Color::White => Rgb::new(255, 255, 255),
            Color::Yellow => Rgb::new(255, 255, 0),
        }
    }
}

pub const LABELS_TO_COLORS: [(&str, Color); 13] = [
    ("Bivalent", Color::DarkKhaki),
    ("ConstitutiveHet", Color::PaleTurquoise),
    ("CTCF", Color::GreenYellow),
    ("Enhancer", Color::Orange),
    ("EnhancerLow", Color::Yellow),
    ("FacultativeHet", Color::Purple),
    ("K9K36", Color::MediumAquamarine),
    ("LowConfidence", Color::Silver),
    ("Promoter", Color::Red),
    ("PromoterFlanking", Color::OrangeRed),
    ("Quiescent", Color::White),
    ("RegPermissive", Color::Yellow),
    ("Transcribed", Color::Green),
];

pub type LabelColors = HashMap<String, Rgb>;

pub fn default_label_colors() -> LabelColors {
    LABELS_TO_COLORS
        .iter()
        .map(|(label, color)| (label.to_string(), color.rgb()))
        .collect()
}

/// Reads a `label<TAB>r,g,b` table with no header.
pub fn parse_label_colors<R: Read>(reader: R) -> Result<LabelColors, SegwayError> {
    let mut colors = LabelColors::new();
    for result in tsv_reader(reader).records() {
        let record = result?;
        match (record.len(), record.get(0), record.get(1)) {
            (2, Some(label), Some(rgb)) => {
                colors.insert(label.to_string(), rgb.parse()?);
            }
            _ => {
                return Err(SegwayError::MalformedRow {
                    line: line_of(&record),
                    message: "expected `label<TAB>r,g,b`".to_string(),
                });
            }
        }
    }
    Ok(colors)
}

pub type Mnemonics = HashMap<String, String>;

/// Reads the two-column `old<TAB>new` mnemonics table; the first row is a header.
pub fn parse_mnemonics<R: Read>(reader: R) -> Result<Mnemonics, SegwayError> {
    let mut mnemonics = Mnemonics::new();
    for result in tsv_reader(reader).records().skip(1) {
        let record = result?;
        match (record.len(), record.get(0), record.get(1)) {
            (2, Some(old), Some(new)) => {
                mnemonics.insert(old.to_string(), new.to_string());
            }
            _ => {
                return Err(SegwayError::MalformedRow {
                    line: line_of(&record),
                    message: format!("expected two columns, found {}", record.len()),
                });
            }
        }
    }
    Ok(mnemonics)
}

pub(crate) fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader)
}

pub(crate) fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

/// UCSC `track`/`browser` definition lines and `#` comments.
fn is_header(record: &StringRecord) -> bool {
    record.get(0).is_some_and(|first| {
        first.starts_with('#')
            || first == "track"
            || first == "browser"
            || first.starts_with("track ")
            || first.starts_with("browser ")
    })
}

fn label_of(record: &StringRecord) -> Result<&str, SegwayError> {
    record
        .get(LABEL_COLUMN)
        .ok_or_else(|| SegwayError::MalformedRow {
            line: line_of(record),
            message: format!("expected at least {} columns, found {}", LABEL_COLUMN + 1, record.len()),
        })
}

/// Replaces the color (last column) using the label suffix after the last underscore.
pub fn recolor_row(record: &StringRecord, colors: &LabelColors) -> Result<Vec<String>, SegwayError> {
    let label = label_of(record)?;
    let key = label.rsplit('_').next().unwrap_or(label);
    let rgb = colors
        .get(key)
        .ok_or_else(|| SegwayError::UnknownLabel(key.to_string()))?;
    let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
    if let Some(last) = row.last_mut() {
        *last = rgb.to_string();
    }
    Ok(row)
}

pub fn relabel_row(record: &StringRecord, mnemonics: &Mnemonics) -> Result<Vec<String>, SegwayError> {
    let label = label_of(record)?;
    let mnemonic = mnemonics
        .get(label)
        .ok_or_else(|| SegwayError::UnknownMnemonic(label.to_string()))?;
    let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
    row[LABEL_COLUMN] = mnemonic.clone();
    Ok(row)
}

/// Recolors every data row; `track`/`browser`/comment lines are copied as is.
/// Returns the number of recolored rows.
pub fn recolor_bed<R: Read, W: Write>(
    input: R,
    output: W,
    colors: &LabelColors,
) -> Result<u64, SegwayError> {
    let mut writer = tsv_writer(output);
    let mut count = 0;
    for result in tsv_reader(input).records() {
        let record = result?;
        if is_header(&record) {
            writer.write_record(&record)?;
            continue;
        }
        writer.write_record(recolor_row(&record, colors)?)?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    tracing::info!(rows = count, "recolored BED rows");
    Ok(count)
}

/// The first row of the BED is the UCSC track definition line and is copied verbatim.
/// Returns the number of relabeled rows.
pub fn relabel_bed<R: Read, M: Read, W: Write>(
    bed: R,
    mnemonics: M,
    output: W,
) -> Result<u64, SegwayError> {
    let mnemonics = parse_mnemonics(mnemonics)?;
    let mut writer = tsv_writer(output);
    let mut records = tsv_reader(bed).into_records();
    if let Some(header) = records.next() {
        writer.write_record(&header?)?;
    }
    let mut count = 0;
    for result in records {
        let record = result?;
        writer.write_record(relabel_row(&record, &mnemonics)?)?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    tracing::info!(rows = count, mnemonics = mnemonics.len(), "relabeled BED rows");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn rgb_display_and_parse() {
        assert_eq!(Rgb::new(255, 0, 0).to_string(), "255,0,0");
        assert_eq!("255,195,77".parse::<Rgb>().unwrap(), Color::Orange.rgb());
    }

    #[test]
    fn rgb_out_of_range() {
        assert_matches!("256,0,0".parse::<Rgb>(), Err(SegwayError::InvalidRgb(_)));
        assert_matches!("23,-1,9".parse::<Rgb>(), Err(SegwayError::InvalidRgb(_)));
        assert_matches!("1,2".parse::<Rgb>(), Err(SegwayError::InvalidRgb(_)));
    }

    #[test]
    fn recolor_row_uses_label_suffix() {
        let colors = LabelColors::from([("foo".to_string(), Color::Red.rgb())]);
        let row = record(&[
            "chr19", "0", "90800", "0_foo", "1000", ".", "0", "90800", "102,102,102",
        ]);
        let result = recolor_row(&row, &colors).unwrap();
        assert_eq!(
            result,
            vec!["chr19", "0", "90800", "0_foo", "1000", ".", "0", "90800", "255,0,0"]
        );
    }

    #[test]
    fn recolor_row_unknown_label() {
        let row = record(&["chr1", "0", "10", "3_Nope", "1000", ".", "0", "10", "0,0,0"]);
        let err = recolor_row(&row, &default_label_colors()).unwrap_err();
        assert_matches!(err, SegwayError::UnknownLabel(label) if label == "Nope");
    }

    #[test]
    fn relabel_row_replaces_label() {
        let mnemonics = Mnemonics::from([("0".to_string(), "foo".to_string())]);
        let row = record(&[
            "chr19", "0", "90800", "0", "1000", ".", "0", "90800", "102,102,102",
        ]);
        let result = relabel_row(&row, &mnemonics).unwrap();
        assert_eq!(result[3], "foo");
        assert_eq!(result[8], "102,102,102");
    }

    #[test]
    fn parse_mnemonics_skips_header() {
        let result = parse_mnemonics("old\tnew\n0\tfoo\n1\tbar\n".as_bytes()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result["0"], "foo");
        assert_eq!(result["1"], "bar");
    }

    #[test]
    fn parse_mnemonics_rejects_extra_columns() {
        let err = parse_mnemonics("old\tnew\n0\tfoo\textra\n".as_bytes()).unwrap_err();
        assert_matches!(err, SegwayError::MalformedRow { line: 2, .. });
    }

    #[test]
    fn header_lines_need_keyword_and_space() {
        assert!(is_header(&record(&["track name=segway"])));
        assert!(is_header(&record(&["browser position chr1:1-100"])));
        assert!(is_header(&record(&["#comment"])));
        assert!(!is_header(&record(&["track_1", "0", "10", "0_Promoter"])));
        assert!(!is_header(&record(&["browserChr", "0", "10", "0_Promoter"])));
    }

    #[test]
    fn recolor_contig_named_like_header() {
        let input = "track_1\t0\t10\t0_Promoter\t1000\t.\t0\t10\t0,0,0\n";
        let mut output = Vec::new();
        let rows = recolor_bed(input.as_bytes(), &mut output, &default_label_colors()).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "track_1\t0\t10\t0_Promoter\t1000\t.\t0\t10\t255,0,0\n"
        );
    }

    #[test]
    fn default_palette_is_complete() {
        let colors = default_label_colors();
        assert_eq!(colors.len(), LABELS_TO_COLORS.len());
        assert_eq!(colors["Quiescent"], Rgb::new(255, 255, 255));
        assert_eq!(colors["Transcribed"], Rgb::new(0, 128, 0));
    }
}
