use serde::ser::{Serialize, SerializeMap, Serializer};

use super::StageRecord;

const WIDTH: usize = 80;

/// Collected results of an immediate run, rendered as JSON or as a text report.
///
/// JSON is an object keyed by stage in run order; the text report has a
/// header block followed by one section per stage.
pub struct Summary<'r> {
    /// `label: value` lines at the top of the text report
    header: Vec<(String, String)>,
    records: &'r [StageRecord],
}

impl<'r> Summary<'r> {
    pub fn new(records: &'r [StageRecord]) -> Self {
        Self {
            header: Vec::new(),
            records,
        }
    }

    pub fn with_header(mut self, label: &str, value: impl ToString) -> Self {
        self.header.push((label.to_owned(), value.to_string()));
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let rule = "=".repeat(WIDTH);
        let thin = "-".repeat(WIDTH);
        let mut lines = Vec::with_capacity(16 + 8 * self.records.len());

        lines.push(rule.clone());
        lines.push("GENOME QUALITY CONTROL SUMMARY REPORT".to_owned());
        lines.push(rule.clone());
        for (label, value) in &self.header {
            lines.push(format!("{label}: {value}"));
        }
        lines.push(rule.clone());
        lines.push(String::new());

        for record in self.records {
            lines.push(record.title.clone());
            lines.push(thin.clone());
            lines.push(format!("  status: {}", record.result.status().as_str()));
            for (key, value) in record.result.payload() {
                lines.push(format!("  {key}: {value}"));
            }
            lines.push(String::new());
        }

        lines.push(rule.clone());
        lines.push("END OF REPORT".to_owned());
        lines.push(rule);
        lines.join("\n")
    }
}

impl Serialize for Summary<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in self.records {
            map.serialize_entry(&record.key, &record.result)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pipeline::{Payload, StageResult};

    fn records() -> Vec<StageRecord> {
        let mut payload = Payload::new();
        payload.insert("tool".to_owned(), "seqkit".to_owned());
        vec![
            StageRecord {
                key: "telomere_gap".to_owned(),
                title: "TELOMERE AND GAP ANALYSIS".to_owned(),
                result: StageResult::success(payload),
            },
            StageRecord {
                key: "merqury".to_owned(),
                title: "MERQURY QV CALCULATION".to_owned(),
                result: StageResult::skipped("no reads"),
            },
        ]
    }

    #[test]
    fn test_json_keeps_run_order() -> anyhow::Result<()> {
        let records = records();
        let json = Summary::new(&records).to_json()?;
        let telo = json.find("telomere_gap").unwrap();
        let merq = json.find("merqury").unwrap();
        assert!(telo < merq);

        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["telomere_gap"]["status"], "success");
        assert_eq!(value["telomere_gap"]["tool"], "seqkit");
        assert_eq!(value["merqury"]["reason"], "no reads");
        Ok(())
    }

    #[test]
    fn test_text_report() {
        let records = records();
        let text = Summary::new(&records)
            .with_header("Genome", "/data/asm.fa")
            .with_header("Threads", 8)
            .render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(80));
        assert_eq!(lines[1], "GENOME QUALITY CONTROL SUMMARY REPORT");
        assert_eq!(lines[3], "Genome: /data/asm.fa");
        assert_eq!(lines[4], "Threads: 8");
        assert_eq!(lines[7], "TELOMERE AND GAP ANALYSIS");
        assert_eq!(lines[8], "-".repeat(80));
        assert_eq!(lines[9], "  status: success");
        assert_eq!(lines[10], "  tool: seqkit");
        assert_eq!(lines[lines.len() - 2], "END OF REPORT");
    }
}
