use std::collections::HashSet;
use std::io::{stdout, Read, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use tsparser::{
    packet::PAT_PID, DecodedTable, Pid, ProgramAssociation, ProgramMap, ScanOpts, TableScanner,
};

#[derive(Debug, Serialize)]
struct TableLine {
    pid: Pid,
    table_id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    section_number: Option<u8>,
    length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pat: Option<ProgramAssociation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pmt: Option<ProgramMap>,
}

/// Tracks the PMT PIDs announced by the most recent PAT.
#[derive(Default)]
struct Programs {
    pmt_pids: HashSet<Pid>,
}

impl Programs {
    fn describe(&mut self, decoded: &DecodedTable) -> TableLine {
        let DecodedTable { pid, table } = decoded;
        let mut line = TableLine {
            pid: *pid,
            table_id: table.table_id(),
            version: table.version_number(),
            section_number: table.section_number(),
            length: table.len(),
            pat: None,
            pmt: None,
        };

        if *pid == PAT_PID && table.table_id() == ProgramAssociation::TABLE_ID {
            match ProgramAssociation::try_from(table) {
                Ok(pat) => {
                    self.pmt_pids = pat.programs.values().copied().collect();
                    line.pat = Some(pat);
                }
                Err(err) => warn!(pid, "failed to decode PAT: {err}"),
            }
        } else if self.pmt_pids.contains(pid) && table.table_id() == ProgramMap::TABLE_ID {
            match ProgramMap::try_from(table) {
                Ok(pmt) => line.pmt = Some(pmt),
                Err(err) => warn!(pid, "failed to decode PMT: {err}"),
            }
        }
        line
    }
}

pub fn tables<R: Read + Send>(reader: R, opts: ScanOpts) -> Result<()> {
    let mut scanner = TableScanner::with_opts(reader, opts);
    let mut programs = Programs::default();
    let mut out = stdout().lock();

    for zult in scanner.by_ref() {
        let decoded = zult.context("scanning input")?;
        let line = programs.describe(&decoded);
        serde_json::to_writer(&mut out, &line).context("serializing to json")?;
        out.write_all(b"\n").context("writing to stdout")?;
    }

    let summary = scanner.summary();
    info!(
        "{} tables from {} packets; {} dropped, {} invalid tables",
        summary.total.tables, summary.total.packets, summary.total.dropped, summary.total.invalid_tables
    );
    Ok(())
}
