//! Human readable output of decoded data sets.
use dicom_stream_core::{DicomValue, VR};
use dicom_stream_object::{InMemDataSet, InMemElement};
use std::fmt::Write;

/// Maximum number of characters of a text value to show.
const TEXT_LIMIT: usize = 64;
/// Maximum number of bytes of a binary value to show.
const BYTES_LIMIT: usize = 16;

/// Counts describing the structure of a decoded data set.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    /// the number of elements at the root of the data set
    pub top_level: usize,
    /// the number of elements, including those in sequence items
    pub total: usize,
    /// the deepest level of sequence nesting
    pub max_depth: usize,
    /// the number of bytes read from the source
    pub bytes: u64,
}

impl Summary {
    /// Gather the counts of a data set.
    pub fn of(dataset: &InMemDataSet, bytes: u64) -> Self {
        let mut summary = Summary {
            top_level: dataset.len(),
            bytes,
            ..Default::default()
        };

        let mut pending = vec![(dataset, 0)];
        while let Some((dataset, depth)) = pending.pop() {
            summary.max_depth = summary.max_depth.max(depth);
            summary.total += dataset.len();
            for elem in dataset {
                if let Some(items) = elem.items() {
                    pending.extend(items.iter().map(|item| (item, depth + 1)));
                }
            }
        }
        summary
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} elements ({} in total), nesting depth {}, {} bytes",
            self.top_level, self.total, self.max_depth, self.bytes
        )
    }
}

enum Line<'a> {
    Element(&'a InMemElement),
    Item(usize, &'a InMemDataSet),
}

/// Render the element tree of a data set in stream order,
/// one element per line, indenting the contents of each item.
pub fn dump_dataset(dataset: &InMemDataSet) -> String {
    let mut out = String::new();
    let mut stack: Vec<(Line, usize)> = dataset
        .iter()
        .rev()
        .map(|elem| (Line::Element(elem), 0))
        .collect();

    while let Some((line, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        match line {
            Line::Element(elem) => {
                let _ = writeln!(
                    out,
                    "{}{} {} {:>10} {}",
                    indent,
                    elem.header().tag,
                    elem.vr(),
                    elem.header().len.to_string(),
                    value_summary(elem)
                );
                if let Some(items) = elem.items() {
                    stack.extend(
                        items
                            .iter()
                            .enumerate()
                            .rev()
                            .map(|(i, item)| (Line::Item(i + 1, item), depth + 1)),
                    );
                }
            }
            Line::Item(number, item) => {
                let _ = writeln!(out, "{}Item #{} (len {})", indent, number, item.length());
                stack.extend(
                    item.iter()
                        .rev()
                        .map(|elem| (Line::Element(elem), depth + 1)),
                );
            }
        }
    }
    out
}

fn value_summary(elem: &InMemElement) -> String {
    match elem.value() {
        DicomValue::Primitive(bytes) if is_text(elem.vr()) => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim_end_matches(['\0', ' ']);
            if text.chars().count() > TEXT_LIMIT {
                let cut: String = text.chars().take(TEXT_LIMIT).collect();
                format!("[{}...]", cut)
            } else {
                format!("[{}]", text)
            }
        }
        DicomValue::Primitive(bytes) => hex_preview(bytes),
        DicomValue::Sequence(sequence) => format!("({} items)", sequence.items().len()),
        DicomValue::PixelSequence(pixels) => format!(
            "(offset table of {} entries, {} fragments)",
            pixels.offset_table().len(),
            pixels.fragments().len()
        ),
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    let mut out = String::new();
    for b in bytes.iter().take(BYTES_LIMIT) {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    if bytes.len() > BYTES_LIMIT {
        out.push_str(" ...");
    }
    out
}

fn is_text(vr: VR) -> bool {
    matches!(
        vr,
        VR::AE
            | VR::AS
            | VR::CS
            | VR::DA
            | VR::DS
            | VR::DT
            | VR::IS
            | VR::LO
            | VR::LT
            | VR::PN
            | VR::SH
            | VR::ST
            | VR::TM
            | VR::UC
            | VR::UI
            | VR::UR
            | VR::UT
    )
}
