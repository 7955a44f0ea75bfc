use crate::domain::ledger::GroupRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct GroupRow<'a> {
    group: &'a str,
    collected: String,
    contributors: u32,
}

/// Writes group totals as CSV (`group,collected,contributors`).
pub struct GroupWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> GroupWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_groups(&mut self, groups: impl IntoIterator<Item = GroupRecord>) -> Result<()> {
        for group in groups {
            self.writer.serialize(GroupRow {
                group: &group.id.0,
                collected: group.collected.to_string(),
                contributors: group.contributors,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
