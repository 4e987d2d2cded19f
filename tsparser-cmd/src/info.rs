use std::io::{stdout, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use tracing::info;
use tsparser::{ScanOpts, Summary, TableScanner};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    skipped_bytes: u64,
    summary: Summary,
}

fn summarize<R: Read + Send>(fpath: &Path, reader: R, opts: ScanOpts) -> Result<Info> {
    let mut scanner = TableScanner::with_opts(reader, opts);
    while TableScanner::scan(&mut scanner).context("scanning input")? {}
    info!(
        "scanned {} packets, {} tables",
        scanner.summary().total.packets,
        scanner.summary().total.tables
    );

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        skipped_bytes: scanner.skipped(),
        summary: scanner.summary().clone(),
    })
}

pub fn info<R: Read + Send>(
    fpath: &Path,
    reader: R,
    opts: ScanOpts,
    format: &Format,
) -> Result<()> {
    let info = summarize(fpath, reader, opts)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let num = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>num$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("compiling template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
=========================================================================================
Skipped:  {{ skipped_bytes }} bytes
PIDs:     {{ #each summary.pids }}{{ @key }}{{ #if @last }}{{ else }}, {{ /if }}{{ /each }}
Packets:  {{ summary.total.packets }}
Tables:   {{ summary.total.tables }}
-----------------------------------------------------------------------------------------
   PID   Packets  NoPayload  Scrambled  Dropped  BadPointer  BadPayload  BadTable  Tables
-----------------------------------------------------------------------------------------
{{ #each summary.pids }}{{ lpad 6 @key }}  {{ lpad 8 packets }}  {{ lpad 9 no_payload }}  {{ lpad 9 scrambled }}  {{ lpad 7 dropped }}  {{ lpad 10 invalid_pointers }}  {{ lpad 10 invalid_payloads }}  {{ lpad 8 invalid_tables }}  {{ lpad 6 tables }}
{{/each }}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render() {
        let mut dat = Vec::new();
        for counter in 0..2u8 {
            let mut packet = [0xffu8; 188];
            packet[..5].copy_from_slice(&[0x47, 0x40, 0x00, 0x10 | counter, 0x00]);
            packet[5..13].copy_from_slice(&[0x00, 0xb0, 0x0d, 0x00, 0x00, 0xc3, 0x00, 0x00]);
            dat.extend_from_slice(&packet);
        }

        let info = summarize(Path::new("test.ts"), &dat[..], ScanOpts::default()).unwrap();
        let text = render_text(&info).unwrap();

        assert_eq!(info.summary.total.packets, 2);
        assert!(text.starts_with("test.ts\n"), "{text}");
        assert!(text.contains("Packets:  2"), "{text}");
    }
}
