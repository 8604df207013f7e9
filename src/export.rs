//! Sentence export: one delimited row per generated sentence.
//!
//! Columns: `attribute, noun, template, sentence, group`. The file is the
//! hand-off to plotting and reporting tools.
//!
//! ```text
//! TemplateEngine → Vec<SentenceRecord> → write_records_csv() → dataset.csv
//! ```

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::model::SentenceRecord;
use crate::Result;

/// Write records as CSV with a header row.
pub fn write_records_csv<W: Write>(records: &[SentenceRecord], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write records to a CSV file, replacing any existing file.
pub fn export_records_csv(records: &[SentenceRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_records_csv(records, std::io::BufWriter::new(file))?;
    info!(path = %path.display(), rows = records.len(), "exported sentence records");
    Ok(())
}

/// Read records back from CSV.
pub fn read_records_csv<R: std::io::Read>(reader: R) -> Result<Vec<SentenceRecord>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Sentence};
    use pretty_assertions::assert_eq;

    fn record(attribute: &str, noun: &str, sentence: &str, group: Group) -> SentenceRecord {
        SentenceRecord {
            attribute: attribute.into(),
            noun: noun.into(),
            template_id: "{name} is a {attribute}".into(),
            sentence: Sentence::from(sentence),
            group,
        }
    }

    #[test]
    fn test_csv_header_and_labels() {
        let records = vec![
            record("nurse", "Emma", "Emma is a nurse", Group::Female),
            record("nurse", "Liam", "Liam is a nurse", Group::Male),
            record("nurse", "Riley", "Riley is a nurse", Group::Neutral),
        ];
        let mut buf = Vec::new();
        write_records_csv(&records, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "attribute,noun,template,sentence,group");
        assert_eq!(lines[1], "nurse,Emma,{name} is a {attribute},Emma is a nurse,F");
        assert_eq!(lines[2], "nurse,Liam,{name} is a {attribute},Liam is a nurse,M");
        assert_eq!(lines[3], "nurse,Riley,{name} is a {attribute},Riley is a nurse,X");
    }

    #[test]
    fn test_custom_group_label_roundtrip() {
        let records = vec![
            record("pilot", "Sam", "Sam is a pilot", Group::Custom("crew".into())),
            record("pilot", "Ann", "Ann is a pilot", Group::Female),
        ];
        let mut buf = Vec::new();
        write_records_csv(&records, &mut buf).unwrap();
        let back = read_records_csv(buf.as_slice()).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_csv_quotes_delimiters() {
        let records = vec![record("cook, chef", "Ann", "Ann is a cook, chef", Group::Female)];
        let mut buf = Vec::new();
        write_records_csv(&records, &mut buf).unwrap();
        let back = read_records_csv(buf.as_slice()).unwrap();
        assert_eq!(back, records);
    }
}
